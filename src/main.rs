//! argguard - validate a program's arguments against a JSON description.

use anyhow::{Context, Result};
use argguard::{render_json, render_text, Config, Dispatch, ParseOutcome, Report};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ARGGUARD_LOG";

/// Declarative argument validation for any program.
#[derive(Parser, Debug)]
#[command(name = "argguard", version, about, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate arguments and print the bound values
    Parse {
        /// JSON configuration, inline or @path
        #[arg(long)]
        config: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Arguments to validate
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the usage text for a configuration
    Usage {
        /// JSON configuration, inline or @path
        #[arg(long)]
        config: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(source: &str) -> Result<Config> {
    let cfg = Config::load(source).context("failed to load config")?;
    cfg.validate().context("invalid config")?;
    Ok(cfg)
}

fn run_parse(config: &str, format: Format, args: &[String]) -> Result<String> {
    let cfg = load_config(config)?;
    let (mut parser, bindings) = cfg.build("argguard");

    if let ParseOutcome::Help(help) = parser
        .parse(args)
        .with_context(|| format!("{}: invalid arguments", parser.name()))?
    {
        help.exit();
    }

    let command = match parser.selected_command().map(str::to_string) {
        Some(name) => {
            debug!(command = %name, "dispatching");
            match parser
                .dispatch()
                .with_context(|| format!("{}: command {} failed", parser.name(), name))?
            {
                Dispatch::Completed(result) => Some(result),
                Dispatch::Help(help) => help.exit(),
            }
        }
        None => None,
    };

    let report = Report {
        values: bindings.values(),
        command,
    };
    match format {
        Format::Json => render_json(&report),
        Format::Text => Ok(render_text(&report)),
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            config,
            format,
            args,
        } => {
            print!("{}", run_parse(&config, format, &args)?);
        }
        Commands::Usage { config } => {
            let cfg = load_config(&config)?;
            let (parser, _) = cfg.build("argguard");
            print!("{}", parser.usage());
        }
    }

    Ok(())
}
