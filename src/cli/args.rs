//! Command-line argument parsing for ollamachat
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;

/// ollamachat - Chat with a local Ollama model from the terminal
#[derive(Parser, Debug)]
#[command(name = "ollamachat")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Stream chat and generate replies from a local Ollama server", long_about = None)]
pub struct Args {
    /// Ollama server URL (overrides config)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Fetch replies in one piece instead of streaming tokens
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand (interactive chat when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Interactive multi-turn chat
    Chat {
        /// System prompt placed at the start of the conversation
        #[arg(long)]
        system: Option<String>,
    },

    /// One-shot completion of a single prompt
    Ask {
        #[arg(value_name = "PROMPT", required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// List available Ollama models
    Models,

    /// Check that the Ollama server is reachable
    Test,

    /// Display or change the configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

/// Persistent configuration changes
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Set the default model
    SetModel { name: String },

    /// Set the Ollama server URL
    SetUrl { url: String },

    /// Turn token streaming on or off
    Stream {
        #[arg(value_enum)]
        mode: Toggle,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to run, defaulting to interactive chat
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Chat { system: None })
    }

    /// Apply command-line overrides to a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.url {
            config.ollama.url = url.clone();
        }
        if let Some(ref model) = self.model {
            config.ollama.current_model = model.clone();
        }
        if self.no_stream {
            config.ollama.stream_response = false;
        }
    }
}

impl Verbosity {
    /// Log filter directive; `None` leaves the config file's level in charge
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("info"),
            Verbosity::VeryVerbose => Some("debug"),
        }
    }
}
