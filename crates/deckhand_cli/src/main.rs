mod providers;
mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use deckhand::{AgentConfig, AgentLoop, ConfigOverrides, MessageKind, Ui};

use crate::terminal::{StdinInput, TerminalUi};

#[derive(Parser, Debug)]
#[command(
    name = "deckhand",
    about = "A terminal coding assistant that works inside one project directory",
    version
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Workspace root every tool is confined to
    #[arg(short, long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Model identifier sent to the provider
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Model provider: chat-api or mock
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Run allow-listed shell commands without asking
    #[arg(long, global = true)]
    auto_execute: bool,

    /// Persist the conversation under the workspace
    #[arg(long, global = true)]
    save_history: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Interactive session (default)
    Chat,
    /// Answer one question and exit
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Print the effective configuration
    Config,
    /// Print the version
    Version,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workspace: self.workspace.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            auto_execute_safe_commands: self.auto_execute.then_some(true),
            save_history: self.save_history.then_some(true),
            verbose: self.verbose.then_some(true),
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("deckhand: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let overrides = cli.overrides();
    let command = cli.command.unwrap_or(Command::Chat);
    if command == Command::Version {
        println!("deckhand {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let config = AgentConfig::load(cli.config.as_deref(), &overrides)
        .context("failed to load configuration")?;
    deckhand::logging::init(config.verbose);

    if command == Command::Config {
        let rendered = serde_json::to_string_pretty(&config.redacted_json())
            .context("failed to render configuration")?;
        println!("{rendered}");
        return Ok(ExitCode::SUCCESS);
    }

    config.validate().context("invalid configuration")?;
    let provider = providers::provider_for_config(&config).map_err(|message| anyhow!(message))?;
    let ui: Arc<dyn Ui> = Arc::new(TerminalUi::detect());
    let mut agent = AgentLoop::new(Arc::new(config), provider, Arc::clone(&ui))
        .context("failed to start session")?;

    match command {
        Command::Ask { question } => {
            let question = question.join(" ");
            match agent.ask(&question) {
                Ok(_) => Ok(ExitCode::SUCCESS),
                Err(_) => Ok(ExitCode::from(1)),
            }
        }
        _ => {
            match agent.restore_history() {
                Ok(0) => {}
                Ok(count) => ui.render(
                    &format!("Restored {count} messages from the previous session."),
                    MessageKind::Info,
                ),
                Err(error) => ui.render(
                    &format!("Could not restore the previous session: {error}"),
                    MessageKind::Warning,
                ),
            }
            let profile = agent.provider_profile();
            ui.render(
                &format!(
                    "deckhand {} | {}/{} | type /help for commands",
                    env!("CARGO_PKG_VERSION"),
                    profile.provider_id,
                    profile.model_id
                ),
                MessageKind::Info,
            );
            agent.run(&mut StdinInput);
            Ok(ExitCode::SUCCESS)
        }
    }
}
