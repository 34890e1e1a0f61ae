//! `fleetctl` binary entrypoint.

use std::io;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fleet_cli::cli::{Cli, Commands, LogFormat};
use fleet_cli::commands::{EvaluateCommand, ReplayCommand};
use fleet_cli::output::OutputFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    run(cli).await?;
    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("fleet_metrics=info".parse()?)
        .add_directive("fleet_autoscaler=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_writer(io::stderr)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), fleet_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Evaluate(args) => {
            EvaluateCommand::new().execute(&mut stdout, &format, &args)?;
        }
        Commands::Replay(args) => {
            ReplayCommand::new()
                .execute(&mut stdout, &format, &args)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_autoscaler::BufferSize;
    use fleet_cli::cli::Format;

    #[test]
    fn cli_parses_evaluate() {
        let cli = Cli::parse_from(["fleetctl", "evaluate", "-b", "10%", "--max", "100", "-a", "9"]);
        match cli.command {
            Commands::Evaluate(args) => {
                assert_eq!(args.buffer, BufferSize::Percentage(10.0));
                assert_eq!(args.max, 100);
                assert_eq!(args.min, 0);
                assert_eq!(args.allocated, 9);
            }
            other => assert!(matches!(other, Commands::Evaluate(_)), "expected evaluate command"),
        }
    }

    #[test]
    fn cli_rejects_bad_buffer() {
        let result = Cli::try_parse_from(["fleetctl", "evaluate", "-b", "150%", "--max", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_replay_with_config() {
        let cli = Cli::parse_from(["fleetctl", "replay", "events.jsonl", "-c", "fleet.toml"]);
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.file.to_str(), Some("events.jsonl"));
                let config = args.config.expect("config path");
                assert_eq!(config.to_str(), Some("fleet.toml"));
            }
            other => assert!(matches!(other, Commands::Replay(_)), "expected replay command"),
        }
    }

    #[test]
    fn cli_respects_global_flags() {
        let cli = Cli::parse_from([
            "fleetctl", "evaluate", "-b", "5", "--max", "10", "--format", "json", "--log-format", "json",
        ]);
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[tokio::test]
    async fn run_replay_missing_file_fails() {
        let cli = Cli::parse_from(["fleetctl", "replay", "/nonexistent/events.jsonl"]);
        let result = run(cli).await;
        assert!(matches!(result, Err(fleet_cli::CliError::Io(_))));
    }
}
