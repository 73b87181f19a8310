//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything else is a
//! negotiation request.

use crate::agent::Session;
use crate::core::Result;

/// Result of parsing a command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Start a negotiation round with this request
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// End the session
    Exit,
    /// Transcript cleared
    Clear,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, session: &mut Session) -> Result<CommandResult> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(CommandResult::None);
    }

    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" if args.is_empty() => Ok(CommandResult::Exit),

        "clear" | "reset" if args.is_empty() => {
            session.reset();
            Ok(CommandResult::Clear)
        }

        "help" | "?" if args.is_empty() => Ok(CommandResult::Handled(help_text())),

        "status" if args.is_empty() => Ok(CommandResult::Handled(status_text(session))),

        "models" if args.is_empty() => {
            let models = session.list_models().await?;
            Ok(CommandResult::Handled(format!(
                "Available models:\n{}",
                models
                    .iter()
                    .map(|m| format!("  - {}", m))
                    .collect::<Vec<_>>()
                    .join("\n")
            )))
        }

        "turns" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Max turns per round: {}",
                    session.negotiation().max_turns()
                )));
            }
            match args.parse::<usize>() {
                Ok(n) => match session.set_max_turns(n) {
                    Ok(()) => Ok(CommandResult::Handled(format!("Max turns set to: {}", n))),
                    Err(e) => Ok(CommandResult::Handled(e.to_string())),
                },
                Err(_) => Ok(CommandResult::Handled(format!(
                    "Usage: turns <n>  ('{}' is not a number)",
                    args
                ))),
            }
        }

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

fn status_text(session: &Session) -> String {
    let config = session.config();
    let [proposer, approver] = session.negotiation().agent_names();
    format!(
        "Accord Status:\n\
         ─────────────────────────────\n\
         Runtime:    {} ({})\n\
         Proposer:   {} [{}]\n\
         Approver:   {} [{}]\n\
         Max turns:  {}\n\
         Approval:   \"{}\"\n\
         Corpora:    {}\n\
         Transcript: {} messages",
        session.provider_name(),
        config.ollama_url(),
        proposer,
        config.models.proposer,
        approver,
        config.models.approver,
        session.negotiation().max_turns(),
        config.negotiation.approval_phrase,
        session.provisioned().len(),
        session.negotiation().transcript().len(),
    )
}

/// Generate help text
fn help_text() -> String {
    r#"Accord Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit       End the session
  clear, reset     Clear the negotiation transcript
  status           Show current configuration
  models           List models served by Ollama
  turns [n]        Show or set max turns per round

Anything else starts a negotiation round, e.g.
  A day in Madrid, my budget is 100 NZD
─────────────────────────────────────────────"#
        .to_string()
}
