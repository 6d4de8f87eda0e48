//! ollamachat - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ollamachat::cli::{Args, Commands, ConfigAction, Toggle};
use ollamachat::repl::{run_exchange, ChatRepl, DisplayManager};
use ollamachat::streaming::Exchange;
use ollamachat::{Config, Conversation, OllamaClient, Outcome, SharedConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command() {
        Commands::Config { action } => {
            // Editing may create the file, so a missing one is not an error here
            let config = match args.config {
                Some(ref path) if !path.exists() => Config::default(),
                _ => Config::load(args.config.clone()).context("Failed to load configuration")?,
            };
            init_logging(&args, &config);
            run_config(&args, config, action)
        }
        command => {
            let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
            init_logging(&args, &config);
            run_client(&args, config, command).await
        }
    }
}

async fn run_client(args: &Args, mut config: Config, command: Commands) -> Result<()> {
    args.apply_overrides(&mut config);
    config.validate()?;
    let shared = SharedConfig::new(config);
    let client = Arc::new(OllamaClient::from_config(shared.clone())?);

    match command {
        Commands::Chat { system } => {
            let conversation = match system {
                Some(prompt) => Conversation::with_system(prompt),
                None => Conversation::new(),
            };
            let mut repl = ChatRepl::new(client, shared, conversation)?;
            repl.run().await?;
        }
        Commands::Ask { prompt } => {
            let settings = shared.snapshot();
            let mut display = DisplayManager::new();
            let outcome = run_exchange(
                &client,
                &mut display,
                Exchange::Generate(prompt.join(" ")),
                settings.ollama.stream_response,
                &settings.ollama.current_model,
            )
            .await;
            if outcome == Outcome::Failed {
                std::process::exit(1);
            }
        }
        Commands::Models => {
            let models = client.list_model_info().await;
            let display = DisplayManager::new();
            display.show_models(&models, &shared.snapshot().ollama.current_model);
        }
        Commands::Test => {
            let url = client.base_url();
            if client.test_connection().await {
                println!("{} Connected to {}", "✓".green(), url);
            } else {
                println!("{} Cannot reach {}", "✗".red(), url);
                println!("\nIs Ollama running? Start with: ollama serve");
                std::process::exit(1);
            }
        }
        Commands::Config { action } => run_config(args, shared.snapshot(), action)?,
    }

    Ok(())
}

/// Logs go to stderr so streamed tokens on stdout stay clean.
/// Precedence: RUST_LOG, then -v/-q, then the config file.
fn init_logging(args: &Args, config: &Config) {
    let level = args
        .verbosity()
        .log_level()
        .unwrap_or(config.logging.level.as_str());
    let directive = format!("ollamachat={}", level);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn config_path(args: &Args) -> Result<PathBuf> {
    args.config
        .clone()
        .or_else(Config::default_path)
        .context("Cannot locate a home directory for the config file")
}

fn run_config(args: &Args, mut config: Config, action: Option<ConfigAction>) -> Result<()> {
    let Some(action) = action else {
        show_config(args, &config);
        return Ok(());
    };

    match action {
        ConfigAction::SetModel { name } => config.ollama.current_model = name,
        ConfigAction::SetUrl { url } => config.ollama.url = url,
        ConfigAction::Stream { mode } => config.ollama.stream_response = mode == Toggle::On,
    }
    config.validate()?;

    let path = config_path(args)?;
    config.save(&path)?;
    println!("{} Saved {}", "✓".green(), path.display());
    Ok(())
}

fn show_config(args: &Args, config: &Config) {
    let mut effective = config.clone();
    args.apply_overrides(&mut effective);
    let model = if effective.ollama.current_model.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        effective.ollama.current_model.clone()
    };

    println!("\n{}", "ollamachat Configuration".bold().cyan());
    println!("{}", "-".repeat(60).cyan());

    println!("Ollama:");
    println!("  URL:             {}", effective.ollama.url);
    println!("  Model:           {}", model);
    println!("  Streaming:       {}", if effective.ollama.stream_response { "on" } else { "off" });
    println!("  Request timeout: {}s", effective.ollama.request_timeout_secs);
    println!("  Idle timeout:    {}s", effective.ollama.idle_timeout_secs);
    println!();

    println!("Logging:");
    println!("  Level: {}", effective.logging.level);
    println!();

    match config_path(args) {
        Ok(path) if path.exists() => println!("File: {}", path.display()),
        Ok(path) => println!("File: {} {}", path.display(), "(not created yet)".dimmed()),
        Err(_) => println!("File: {}", "(no home directory)".dimmed()),
    }
    println!();
}
