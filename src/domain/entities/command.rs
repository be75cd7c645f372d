use std::fmt;

/// A parsed bot command: lowercased name plus argument tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            args,
        }
    }

    /// Arguments re-joined with single spaces
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} {}", self.name, self.args.join(" "))
        }
    }
}

/// Result of parsing a raw message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    Command(Command),
    NotACommand,
}

impl ParsedMessage {
    pub fn is_command(&self) -> bool {
        matches!(self, ParsedMessage::Command(_))
    }
}
