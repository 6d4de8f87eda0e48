//! Slash commands available at the chat prompt

/// Chat prompt command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Clear,
    Models,
    /// `/model` shows the current model; `/model <name>` switches
    Model { name: Option<String> },
    Unknown { input: String },
}

fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// Parse input string into a command; `None` for a chat message
pub fn parse(input: &str) -> Option<Command> {
    if !is_command(input) {
        return None;
    }

    let trimmed = input.trim();
    let rest = trimmed.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let command = match parts.next().map(str::to_lowercase).as_deref() {
        Some("help") | Some("h") => Command::Help,
        Some("exit") | Some("quit") | Some("q") => Command::Exit,
        Some("clear") | Some("reset") => Command::Clear,
        Some("models") => Command::Models,
        Some("model") => Command::Model {
            name: parts.next().map(str::to_string),
        },
        _ => Command::Unknown {
            input: trimmed.to_string(),
        },
    };
    Some(command)
}
