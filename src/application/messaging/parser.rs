//! Message parser - Turns raw chat text into commands

use crate::domain::entities::{Command, ParsedMessage};

/// Parses messages that start with a prefix character
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefix: char,
}

impl CommandParser {
    pub fn new(prefix: char) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    /// Parse a raw message.
    ///
    /// The name must follow the prefix directly: `!render hi` is a command,
    /// `! render hi` and a bare `!` are not.
    pub fn parse(&self, raw: &str) -> ParsedMessage {
        let Some(rest) = raw.strip_prefix(self.prefix) else {
            return ParsedMessage::NotACommand;
        };
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return ParsedMessage::NotACommand;
        }

        let mut tokens = rest.split_whitespace();
        let Some(name) = tokens.next() else {
            return ParsedMessage::NotACommand;
        };
        let args = tokens.map(str::to_string).collect();

        ParsedMessage::Command(Command::new(name, args))
    }
}
