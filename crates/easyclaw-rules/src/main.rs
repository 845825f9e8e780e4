mod config;
mod service;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use service::{Command, RulesService};

/// Compile user rules into policy fragments, guards and skills
#[derive(Parser)]
#[command(name = "easyclaw-rules", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompile every rule and sync the skills directory
    Sync,
    /// Add a rule and compile it
    Add {
        /// Rule text
        text: String,
    },
    /// Replace a rule's text and recompile it
    Edit {
        /// Rule id
        id: String,
        /// New rule text
        text: String,
    },
    /// Delete a rule, its artifacts and any skill file
    Remove {
        /// Rule id
        id: String,
    },
    /// Print the compiled policy view
    Policy {
        /// Maximum view length in bytes
        #[arg(long)]
        max_length: Option<usize>,
    },
    /// List active guards
    Guards,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Sync => Command::Sync,
            Commands::Add { text } => Command::Add { text },
            Commands::Edit { id, text } => Command::Edit { id, text },
            Commands::Remove { id } => Command::Remove { id },
            Commands::Policy { max_length } => Command::Policy { max_length },
            Commands::Guards => Command::Guards,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;

    let service = RulesService::new(config);
    service.run(cli.command.into()).await
}
