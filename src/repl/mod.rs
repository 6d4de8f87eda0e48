//! Interactive chat loop
//!
//! Keeps one conversation, sends it in chat mode on every turn and appends
//! the assistant reply only once it has completed.

pub mod commands;
pub mod display;
pub mod input;

use anyhow::Result;
use colored::*;
use std::sync::Arc;

use crate::config::SharedConfig;
use crate::repl::commands::Command;
pub use crate::repl::display::DisplayManager;
use crate::repl::input::InputHandler;
use crate::streaming::{Callbacks, Exchange, OllamaClient, Outcome};
use crate::types::{Conversation, Message};

/// Run one exchange with terminal output.
///
/// Tokens go to stdout as they arrive when streaming is on; otherwise a
/// spinner runs until the full reply is printed. Ctrl-C cancels the
/// exchange without affecting the client. Errors are printed, not returned.
pub async fn run_exchange(
    client: &OllamaClient,
    display: &mut DisplayManager,
    exchange: Exchange,
    streaming: bool,
    model: &str,
) -> Outcome {
    let spinner = (!streaming).then(|| display.start_waiting(model));
    let cancel = client.session_token();
    let watcher = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let display_ref = &*display;
    let on_error_spinner = spinner.clone();
    let mut callbacks = Callbacks::new()
        .on_complete(move |reply| match spinner {
            Some(pb) => {
                pb.finish_and_clear();
                display_ref.show_reply(reply);
            }
            None => println!(),
        })
        .on_error(move |err| {
            if let Some(pb) = on_error_spinner {
                pb.finish_and_clear();
            } else {
                println!();
            }
            display_ref.show_error(&err.to_string());
        });
    if streaming {
        callbacks = callbacks.on_token(move |token| display_ref.stream_token(token));
    }

    let result = client
        .send_with_cancel(exchange, Some(model), callbacks, cancel)
        .await;
    ctrl_c.abort();

    display.finish_current();
    match result {
        Ok(Outcome::Cancelled) => {
            println!();
            display.show_warning("Cancelled");
            Outcome::Cancelled
        }
        Ok(outcome) => outcome,
        Err(e) => {
            display.show_error(&e.to_string());
            Outcome::Failed
        }
    }
}

/// Interactive chat session
pub struct ChatRepl {
    client: Arc<OllamaClient>,
    config: SharedConfig,
    conversation: Conversation,
    input: InputHandler,
    display: DisplayManager,
}

impl ChatRepl {
    pub fn new(
        client: Arc<OllamaClient>,
        config: SharedConfig,
        conversation: Conversation,
    ) -> Result<Self> {
        let input = match InputHandler::default_history_path() {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };

        Ok(Self {
            client,
            config,
            conversation,
            input,
            display: DisplayManager::new(),
        })
    }

    /// Read-eval-print until `/exit` or EOF
    pub async fn run(&mut self) -> Result<()> {
        let settings = self.config.snapshot();
        self.display.show_banner(
            env!("CARGO_PKG_VERSION"),
            &settings.ollama.current_model,
            &self.client.base_url(),
        );

        while let Some(line) = self.input.read_line()? {
            if line.is_empty() {
                continue;
            }

            match commands::parse(&line) {
                Some(command) => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                None => self.send_turn(&line).await,
            }
        }

        self.input.save_history()?;
        println!("{}", "Goodbye!".green());
        Ok(())
    }

    /// Returns false when the loop should exit
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Help => self.display.show_help(),
            Command::Exit => return false,
            Command::Clear => {
                self.conversation.clear();
                self.display.show_info("Conversation cleared");
            }
            Command::Models => {
                let models = self.client.list_model_info().await;
                let current = self.config.snapshot().ollama.current_model;
                self.display.show_models(&models, &current);
            }
            Command::Model { name: None } => {
                let current = self.config.snapshot().ollama.current_model;
                if current.is_empty() {
                    self.display.show_warning("No model selected");
                } else {
                    self.display.show_info(&format!("Current model: {}", current));
                }
            }
            Command::Model { name: Some(name) } => {
                self.config
                    .update(|c| c.ollama.current_model = name.clone());
                self.display.show_info(&format!("Switched to {}", name));
            }
            Command::Unknown { input } => {
                self.display
                    .show_error(&format!("Unknown command: {}", input));
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        true
    }

    async fn send_turn(&mut self, text: &str) {
        let settings = self.config.snapshot();
        let mut messages = self.conversation.messages().to_vec();
        messages.push(Message::user(text));

        let outcome = run_exchange(
            &self.client,
            &mut self.display,
            Exchange::Chat(messages),
            settings.ollama.stream_response,
            &settings.ollama.current_model,
        )
        .await;

        if let Outcome::Completed(reply) = outcome {
            self.conversation.push_user(text);
            self.conversation.push_assistant(reply);
        }
    }
}
