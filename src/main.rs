//! Convoplay CLI
//!
//! Command-line front end for the Convoplay convolution reverb player.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use convoplay::cli::{commands, Cli, Commands};
use convoplay::PlayerConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Convoplay v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("Convoplay v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: PlayerConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            input,
            ir,
            output,
            block_size,
            loops,
        } => commands::render(config, &input, ir.as_deref(), &output, block_size, loops),
        Commands::Preview { input, ir, output } => {
            commands::preview(config, &input, &ir, &output)
        }
        Commands::ListIrs { dir } => commands::list_irs(&config, dir.as_deref()),
        Commands::Info { file } => commands::info(&file),
    }
}
