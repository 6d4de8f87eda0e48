//! Display manager for the chat terminal UI
//!
//! Streams tokens to stdout, shows a spinner while a buffered reply is
//! pending, and prints colored status lines.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

use crate::models::ModelInfo;

/// Display manager for REPL UI
pub struct DisplayManager {
    current_bar: Option<ProgressBar>,
    update_interval: Duration,
}

impl DisplayManager {
    /// Create new display manager
    ///
    /// Spinner ticks every 100ms
    pub fn new() -> Self {
        DisplayManager {
            current_bar: None,
            update_interval: Duration::from_millis(100),
        }
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, model: &str, url: &str) {
        let width = 64;
        let model = if model.is_empty() { "(none)" } else { model };
        let title = format!("  ollamachat {} - Chat with a local Ollama model", version);
        let info = format!("  Model: {} | Server: {}", model, url);

        println!("\n{}", "=".repeat(width).cyan());
        println!("{}", title.bold().cyan());
        println!("{}", info.dimmed());
        println!("{}\n", "=".repeat(width).cyan());
        println!(
            "Type a message (or {} for commands, {} to quit)\n",
            "/help".green(),
            "/exit".green()
        );
    }

    /// Spinner shown while a non-streaming reply is pending
    pub fn start_waiting(&mut self, model: &str) -> ProgressBar {
        self.finish_current();

        let pb = ProgressBar::new_spinner();
        // Template is a literal; fall back to the default style if it ever fails.
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Waiting for {}...", model));
        pb.enable_steady_tick(self.update_interval);

        self.current_bar = Some(pb.clone());
        pb
    }

    /// Finish current spinner
    pub fn finish_current(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Display one streamed token
    pub fn stream_token(&self, token: &str) {
        print!("{}", token);
        let _ = io::stdout().flush();
    }

    /// Display a full reply
    pub fn show_reply(&self, reply: &str) {
        println!("{}", reply);
    }

    /// Display error message
    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    /// Display warning message
    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    /// Display info message
    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    /// List models, marking the current one
    pub fn show_models(&self, models: &[ModelInfo], current: &str) {
        if models.is_empty() {
            self.show_warning("No models available. Is the Ollama server running?");
            return;
        }

        println!("\n{}", "Available Models:".bold().cyan());
        println!("{}", "-".repeat(60).cyan());
        for model in models {
            let description = model.description();
            if model.name == current {
                println!(
                    "  {} {} {}",
                    "*".green().bold(),
                    model.name.green().bold(),
                    description.dimmed()
                );
            } else {
                println!("    {} {}", model.name, description.dimmed());
            }
        }
        println!();
    }

    /// Display the chat command list
    pub fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        let commands = [
            ("/help, /h", "Show this help message"),
            ("/model [name]", "Show or switch the current model"),
            ("/models", "List installed models"),
            ("/clear", "Forget the conversation so far"),
            ("/exit, /quit, /q", "Exit"),
        ];
        for (command, description) in commands {
            println!("  {:<20} {}", command.green(), description);
        }
        println!("\nCtrl-C cancels a reply in progress.\n");
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}
