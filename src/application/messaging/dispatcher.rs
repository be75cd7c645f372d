//! Command dispatcher - Routes parsed commands to handlers

use std::collections::HashMap;
use std::sync::Arc;

use super::parser::CommandParser;
use crate::application::commands::{CommandHandler, Invocation};
use crate::application::errors::ConfigError;
use crate::domain::entities::{Command, ConversationId, InboundEvent, ParsedMessage, Reply};

/// Outcome of handling one message. Dispatch itself never fails.
#[derive(Debug)]
pub enum DispatchOutcome {
    NotACommand,
    UnknownCommand(String),
    Reply(Reply),
    HandlerFailed { command: String, message: String },
}

/// Message dispatcher - prefix parsing plus a name -> handler table
pub struct Dispatcher {
    parser: CommandParser,
    routes: HashMap<String, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    pub fn new(prefix: char) -> Self {
        Self {
            parser: CommandParser::new(prefix),
            routes: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> char {
        self.parser.prefix()
    }

    /// Register a handler under a (case-insensitive) command name
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<(), ConfigError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(format!("invalid command name '{}'", name)));
        }
        if self.routes.contains_key(&name) {
            return Err(ConfigError::InvalidValue(format!("command '{}' registered twice", name)));
        }

        tracing::debug!("Registered command {}{}", self.prefix(), name);
        self.routes.insert(name, handler);
        Ok(())
    }

    /// Registered command names, sorted
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn parse(&self, raw: &str) -> ParsedMessage {
        self.parser.parse(raw)
    }

    /// Run the handler for `command`.
    ///
    /// The handler runs in its own task, so an error or a panic inside it is
    /// turned into [`DispatchOutcome::HandlerFailed`].
    pub async fn dispatch(&self, command: Command, conversation: &ConversationId) -> DispatchOutcome {
        let Some(handler) = self.routes.get(&command.name).cloned() else {
            tracing::debug!("[{}] Unknown command: {}", conversation, command.name);
            return DispatchOutcome::UnknownCommand(command.name);
        };

        let name = command.name.clone();
        let invocation = Invocation {
            command,
            conversation: conversation.clone(),
            prefix: self.prefix(),
        };

        match tokio::spawn(async move { handler.handle(invocation).await }).await {
            Ok(Ok(reply)) => DispatchOutcome::Reply(reply),
            Ok(Err(e)) => {
                if e.is_user_error() {
                    tracing::debug!("[{}] {} rejected input: {}", conversation, name, e);
                } else {
                    tracing::error!("[{}] {} failed: {}", conversation, name, e);
                }
                DispatchOutcome::HandlerFailed {
                    command: name,
                    message: e.user_message(),
                }
            }
            Err(e) => {
                tracing::error!("[{}] {} handler crashed: {}", conversation, name, e);
                DispatchOutcome::HandlerFailed {
                    command: name,
                    message: "Something went wrong handling that command.".to_string(),
                }
            }
        }
    }

    /// Parse and dispatch an inbound event
    pub async fn handle_event(&self, event: &InboundEvent) -> DispatchOutcome {
        match self.parse(&event.text) {
            ParsedMessage::NotACommand => DispatchOutcome::NotACommand,
            ParsedMessage::Command(command) => self.dispatch(command, &event.conversation).await,
        }
    }

    /// What the user sees for an outcome, if anything
    pub fn reply_for(&self, outcome: DispatchOutcome) -> Option<Reply> {
        match outcome {
            DispatchOutcome::NotACommand => None,
            DispatchOutcome::Reply(reply) => Some(reply),
            DispatchOutcome::HandlerFailed { message, .. } => Some(Reply::Text(message)),
            DispatchOutcome::UnknownCommand(name) => {
                let prefix = self.prefix();
                let hint = if self.routes.contains_key("help") {
                    format!(" Try {}help.", prefix)
                } else {
                    String::new()
                };
                Some(Reply::Text(format!("Unknown command: {}{}.{}", prefix, name, hint)))
            }
        }
    }
}
