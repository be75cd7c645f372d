use std::sync::Arc;

use async_trait::async_trait;

use super::{CommandHandler, HandlerKind, Invocation};
use crate::application::errors::HandlerError;
use crate::application::services::RenderService;
use crate::domain::entities::Reply;

/// One line of the help listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub name: String,
    pub kind: HandlerKind,
}

/// `help [command]`
pub struct HelpHandler {
    entries: Arc<Vec<HelpEntry>>,
}

impl HelpHandler {
    pub fn new(entries: Arc<Vec<HelpEntry>>) -> Self {
        Self { entries }
    }

    fn describe(entry: &HelpEntry, prefix: char) -> String {
        let mut help = format!("{}{} - {}", prefix, entry.name, entry.kind.description());
        let usage = entry.kind.usage();
        if !usage.is_empty() {
            help.push_str(&format!("\nUsage: {}{} {}", prefix, entry.name, usage));
        }
        help
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, invocation: Invocation) -> Result<Reply, HandlerError> {
        let prefix = invocation.prefix;

        if let Some(wanted) = invocation.command.args.first() {
            let wanted = wanted.trim_start_matches(prefix).to_lowercase();
            return match self.entries.iter().find(|e| e.name == wanted) {
                Some(entry) => Ok(Reply::text(Self::describe(entry, prefix))),
                None => Ok(Reply::text(format!("Command {}{} not found", prefix, wanted))),
            };
        }

        let mut help = "Available commands:".to_string();
        for entry in self.entries.iter() {
            help.push_str(&format!("\n  {}{} - {}", prefix, entry.name, entry.kind.description()));
        }
        Ok(Reply::text(help))
    }
}

/// `ping`
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, _invocation: Invocation) -> Result<Reply, HandlerError> {
        Ok(Reply::text("pong"))
    }
}

/// `version`
pub struct VersionHandler {
    name: String,
}

impl VersionHandler {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl CommandHandler for VersionHandler {
    async fn handle(&self, _invocation: Invocation) -> Result<Reply, HandlerError> {
        Ok(Reply::text(format!("{} v{}", self.name, env!("CARGO_PKG_VERSION"))))
    }
}

/// `fonts` - configured families and what is already loaded
pub struct FontsHandler {
    render: Arc<RenderService>,
}

impl FontsHandler {
    pub fn new(render: Arc<RenderService>) -> Self {
        Self { render }
    }
}

#[async_trait]
impl CommandHandler for FontsHandler {
    async fn handle(&self, _invocation: Invocation) -> Result<Reply, HandlerError> {
        let fonts = self.render.fonts();
        let mut out = format!("Default: {} {}pt", self.render.defaults().family, self.render.defaults().size);

        let catalog = fonts.catalog();
        if !catalog.is_empty() {
            out.push_str("\nFamilies:");
            for status in catalog {
                let state = if status.path.is_some() { "installed" } else { "missing" };
                out.push_str(&format!("\n  {} ({})", status.family, state));
            }
        }

        let cached = fonts.cached();
        if cached.is_empty() {
            out.push_str("\nLoaded: none");
        } else {
            let loaded: Vec<String> = cached.iter().map(|f| format!("{} {}pt", f.family(), f.size())).collect();
            out.push_str(&format!("\nLoaded: {}", loaded.join(", ")));
        }

        Ok(Reply::text(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Command;

    fn invocation(name: &str, args: &[&str]) -> Invocation {
        Invocation {
            command: Command::new(name, args.iter().map(|s| s.to_string()).collect()),
            conversation: "chat".into(),
            prefix: '!',
        }
    }

    fn help() -> HelpHandler {
        HelpHandler::new(Arc::new(vec![
            HelpEntry { name: "ping".to_string(), kind: HandlerKind::Ping },
            HelpEntry { name: "card".to_string(), kind: HandlerKind::Card },
        ]))
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let reply = help().handle(invocation("help", &[])).await.unwrap();
        let text = reply.as_text().unwrap();
        assert!(text.starts_with("Available commands:"));
        assert!(text.contains("!ping - Check that the bot is alive"));
        assert!(text.contains("!card - Render a titled card"));
    }

    #[tokio::test]
    async fn test_help_for_one_command() {
        let reply = help().handle(invocation("help", &["!CARD"])).await.unwrap();
        assert_eq!(
            reply.as_text(),
            Some("!card - Render a titled card\nUsage: !card <title> [| body]")
        );

        let reply = help().handle(invocation("help", &["nope"])).await.unwrap();
        assert_eq!(reply.as_text(), Some("Command !nope not found"));
    }

    #[tokio::test]
    async fn test_ping_and_version() {
        let reply = PingHandler.handle(invocation("ping", &[])).await.unwrap();
        assert_eq!(reply.as_text(), Some("pong"));

        let reply = VersionHandler::new("placard-bot").handle(invocation("version", &[])).await.unwrap();
        assert_eq!(reply.as_text().unwrap(), format!("placard-bot v{}", env!("CARGO_PKG_VERSION")));
    }
}
