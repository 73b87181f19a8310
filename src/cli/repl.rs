//! Interactive REPL for Accord
//!
//! Reads one request per line, runs a negotiation round for it and prints
//! each message as the agents produce it.

use std::io::{self, BufRead, Write};

use crate::agent::{RoundOutcome, RoundReport, Session};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Message, Result, Role};

/// Format a transcript message for the console
pub fn format_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("# {}: '{}'", message.role, message.content),
        Role::Agent => format!(
            "# {} - {}: '{}'",
            message.role, message.author_name, message.content
        ),
    }
}

/// Format the end-of-round line
pub fn format_outcome(report: &RoundReport) -> String {
    let turns = report.state.turn_count;
    match &report.outcome {
        RoundOutcome::Approved => format!("== Approved after {} turn(s)", turns),
        RoundOutcome::Exhausted => format!(
            "== No agreement reached after {} of {} turns",
            turns, report.state.max_turns
        ),
        RoundOutcome::Errored(e) => format!("== Round failed after {} turn(s): {}", turns, e),
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Run the REPL, then tear the session down however the loop ended
    pub async fn run(mut self) -> Result<()> {
        self.print_banner();

        let result = self.run_loop().await;
        let closed = self.session.close();
        println!("\nGoodbye!");

        result.and(closed)
    }

    async fn run_loop(&mut self) -> Result<()> {
        print!("Checking models...");
        io::stdout().flush()?;

        if let Err(e) = self.session.verify_models().await {
            println!(" failed\n");
            return Err(e);
        }
        println!(" Ready!\n");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut prompt = "Where would you like to go? ";

        loop {
            print!("{}", prompt);
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                // EOF (Ctrl+D)
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            match handle_command(&input, &mut self.session).await {
                Ok(CommandResult::Exit) => break,
                Ok(CommandResult::Clear) => println!("Transcript cleared.\n"),
                Ok(CommandResult::Handled(output)) => println!("{}\n", output),
                Ok(CommandResult::None) => {}
                Ok(CommandResult::Continue(request)) => {
                    let report = self
                        .session
                        .round(&request, |m| println!("{}", format_message(m)))
                        .await;
                    println!("{}", format_outcome(&report));
                    prompt = "\nYour next request: ";
                }
                Err(e) => eprintln!("Command error: {}\n", e),
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.session.config();
        let [proposer, approver] = self.session.negotiation().agent_names();

        println!("Welcome to the Bespoke Travel Agency!");
        println!("─────────────────────────────────────────────");
        println!("Ollama:     {}", config.ollama_url());
        println!("Proposer:   {} ({})", proposer, config.models.proposer);
        println!("Approver:   {} ({})", approver, config.models.approver);
        println!("Max turns:  {}", config.negotiation.max_turns);
        println!();
        println!("Commands: help, status, reset, turns <n>, exit");
        println!("─────────────────────────────────────────────");
    }
}
