//! CLI Module
//!
//! Command-line interface for the Convoplay player.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Convoplay - audio player with convolution reverb
#[derive(Parser, Debug)]
#[command(name = "convoplay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Player configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a file through the real-time engine offline and write the result
    #[command(name = "render")]
    Render {
        /// Input audio file
        input: PathBuf,

        /// Impulse response name or WAV path (reverb stays off without one)
        #[arg(long)]
        ir: Option<String>,

        /// Output WAV file
        #[arg(short, long, default_value = "render.wav")]
        output: PathBuf,

        /// Frames per processing block (defaults to the config value)
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Number of passes through the input
        #[arg(short, long, default_value_t = 1)]
        loops: u32,
    },

    /// Render a file with the whole impulse response, as the preview view does
    #[command(name = "preview")]
    Preview {
        /// Input audio file
        input: PathBuf,

        /// Impulse response name or WAV path
        #[arg(long)]
        ir: String,

        /// Output WAV file
        #[arg(short, long, default_value = "preview.wav")]
        output: PathBuf,
    },

    /// List the selectable impulse responses
    #[command(name = "list-irs")]
    ListIrs {
        /// Additional directory to scan for WAV impulse responses
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print basic information about an audio file
    #[command(name = "info")]
    Info {
        /// Audio file
        file: PathBuf,
    },
}
