//! Chat commands - handler trait, built-in handlers and registration

mod general;
mod render;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::application::errors::{ConfigError, HandlerError};
use crate::application::messaging::Dispatcher;
use crate::application::services::RenderService;
use crate::domain::entities::{Command, ConversationId, Reply};
use crate::infrastructure::config::Config;

pub use general::{FontsHandler, HelpEntry, HelpHandler, PingHandler, VersionHandler};
pub use render::{format_timestamp, parse_card, CardHandler, RenderArgs, RenderHandler};

/// Everything a handler gets to see about one command
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    pub conversation: ConversationId,
    pub prefix: char,
}

/// A chat command implementation
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, invocation: Invocation) -> Result<Reply, HandlerError>;
}

/// Built-in handlers a config can bind command names to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    Help,
    Ping,
    Version,
    Fonts,
    Render,
    Card,
}

impl HandlerKind {
    pub fn description(&self) -> &'static str {
        match self {
            HandlerKind::Help => "List available commands",
            HandlerKind::Ping => "Check that the bot is alive",
            HandlerKind::Version => "Show bot version",
            HandlerKind::Fonts => "List configured and loaded fonts",
            HandlerKind::Render => "Render text to an image",
            HandlerKind::Card => "Render a titled card",
        }
    }

    /// Argument synopsis, shown after the command name
    pub fn usage(&self) -> &'static str {
        match self {
            HandlerKind::Render => "[--font=Family_Name] [--size=N] [--width=N] [--height=N] [--format=png|jpeg] <text>",
            HandlerKind::Card => "<title> [| body]",
            _ => "",
        }
    }
}

/// Build the dispatcher with every configured command registered
pub fn build_dispatcher(config: &Config, render: Arc<RenderService>) -> Result<Dispatcher, ConfigError> {
    config.validate()?;

    let entries: Arc<Vec<HelpEntry>> = Arc::new(
        config
            .commands
            .iter()
            .map(|(name, kind)| HelpEntry {
                name: name.trim().to_lowercase(),
                kind: *kind,
            })
            .collect(),
    );

    let mut dispatcher = Dispatcher::new(config.bot.prefix);
    for (name, kind) in &config.commands {
        let handler: Arc<dyn CommandHandler> = match kind {
            HandlerKind::Help => Arc::new(HelpHandler::new(entries.clone())),
            HandlerKind::Ping => Arc::new(PingHandler),
            HandlerKind::Version => Arc::new(VersionHandler::new(&config.bot.name)),
            HandlerKind::Fonts => Arc::new(FontsHandler::new(render.clone())),
            HandlerKind::Render => Arc::new(RenderHandler::new(render.clone())),
            HandlerKind::Card => Arc::new(CardHandler::new(render.clone())),
        };
        dispatcher.register(name, handler)?;
    }

    tracing::info!("Registered {} commands with prefix '{}'", dispatcher.commands().len(), dispatcher.prefix());
    Ok(dispatcher)
}
