pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use cotiza_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "cotiza",
    about = "Cotiza quotation dialogue CLI",
    long_about = "Drive stage-based quotation dialogues, replay scripted conversations and inspect configuration.",
    after_help = "Examples:\n  cotiza domains\n  cotiza turn --domain instalacion_electrica --message hola --state estado.json --save\n  cotiza replay --domain pozo_tierra --script guion.txt\n  cotiza chat --domain proyecto_pmi"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file (defaults to cotiza.toml or config/cotiza.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Currency code stamped on quotations")]
    currency: Option<String>,
    #[arg(long, global = true, help = "Directory of catalog overrides (*.toml)")]
    catalog_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List registered quotation domains with their stage sequences")]
    Domains,
    #[command(about = "Apply one message to a conversation and print the turn response as JSON")]
    Turn {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        message: String,
        #[arg(long, help = "Conversation state JSON file; a missing file starts a new conversation")]
        state: Option<PathBuf>,
        #[arg(long, requires = "state", help = "Write the updated state back to --state")]
        save: bool,
    },
    #[command(about = "Replay a script (one message per line) from an empty conversation")]
    Replay {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        script: PathBuf,
    },
    #[command(about = "Interactive conversation on stdin/stdout")]
    Chat {
        #[arg(long)]
        domain: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                currency: self.currency.clone(),
                catalog_dir: self.catalog_dir.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Domains => commands::domains::run(options),
        Command::Turn { domain, message, state, save } => {
            commands::turn::run(options, commands::turn::TurnArgs { domain, message, state, save })
        }
        Command::Replay { domain, script } => commands::replay::run(options, &domain, &script),
        Command::Chat { domain } => commands::chat::run(options, &domain),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber on stderr so stdout carries only command output.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    // try_init: a host process may have installed its own subscriber.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
