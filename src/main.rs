//! Accord - two-agent negotiation over local LLMs
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use accord::cli::repl::{format_message, format_outcome};
use accord::llm::OllamaClient;
use accord::{Config, Repl, Session};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Accord - a proposer and an approver negotiate until they agree
#[derive(Parser, Debug)]
#[command(name = "accord")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model for the proposing agent
    #[arg(long)]
    proposer_model: Option<String>,

    /// Model for the approving agent
    #[arg(long)]
    approver_model: Option<String>,

    /// Maximum agent turns per round
    #[arg(long, short = 't')]
    max_turns: Option<usize>,

    /// Directory of notes the proposer can search
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Disable the exchange rate tool
    #[arg(long)]
    no_rates: bool,

    /// Rely on the approval phrase only, without the verdict tool
    #[arg(long)]
    phrase_only: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Single request mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Print the default config file and exit
    #[arg(long)]
    print_config: bool,
}

/// Log level when RUST_LOG is unset; `--debug` means at least debug
fn log_level(verbose: u8, debug: bool) -> &'static str {
    match (verbose, debug) {
        (0, false) => "warn",
        (1, false) => "info",
        (0..=2, _) => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(log_level(args.verbose, args.debug))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.print_config {
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(model) = args.proposer_model {
        config.models.proposer = model;
    }
    if let Some(model) = args.approver_model {
        config.models.approver = model;
    }
    if let Some(max_turns) = args.max_turns {
        config.negotiation.max_turns = max_turns;
    }
    if let Some(dir) = args.corpus {
        config.corpus.dir = Some(dir);
    }
    if args.no_rates {
        config.rates.enabled = false;
    }
    if args.phrase_only {
        config.negotiation.structured_verdict = false;
    }

    info!(ollama = %config.ollama_url(), "Starting Accord");

    let llm = Arc::new(OllamaClient::from_config(&config)?);
    let mut session = Session::open(config, llm).await?;

    // Single request mode
    if let Some(prompt) = args.prompt {
        if let Err(e) = session.verify_models().await {
            session.close()?;
            return Err(e.into());
        }

        let report = session
            .round(&prompt, |m| println!("{}", format_message(m)))
            .await;
        println!("{}", format_outcome(&report));
        session.close()?;

        if report.outcome.is_errored() {
            std::process::exit(2);
        }
        return Ok(());
    }

    // Interactive REPL mode
    Repl::new(session).run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_selects_debug_level() {
        let args = Args::parse_from(["accord", "--debug"]);
        assert!(args.debug);
        assert_eq!(log_level(args.verbose, args.debug), "debug");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log_level(0, false), "warn");
        assert_eq!(log_level(1, false), "info");
        assert_eq!(log_level(2, false), "debug");
        assert_eq!(log_level(3, true), "trace");
    }
}
