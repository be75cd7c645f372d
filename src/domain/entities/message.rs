use chrono::{DateTime, Utc};
use std::fmt;

use super::RenderedImage;

/// Identifies the conversation a message arrived on and replies go back to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A message delivered by the messaging platform
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub id: String,
    pub conversation: ConversationId,
    pub sender: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(conversation: impl Into<ConversationId>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation: conversation.into(),
            sender: None,
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// Payload sent back to a conversation
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Image {
        image: RenderedImage,
        caption: Option<String>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn image(image: RenderedImage) -> Self {
        Reply::Image { image, caption: None }
    }

    pub fn with_caption(self, caption: impl Into<String>) -> Self {
        match self {
            Reply::Image { image, .. } => Reply::Image {
                image,
                caption: Some(caption.into()),
            },
            text => text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(s) => Some(s),
            Reply::Image { .. } => None,
        }
    }

    pub fn as_image(&self) -> Option<&RenderedImage> {
        match self {
            Reply::Image { image, .. } => Some(image),
            Reply::Text(_) => None,
        }
    }
}
