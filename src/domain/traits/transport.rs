use async_trait::async_trait;

use crate::application::errors::TransportError;
use crate::domain::entities::{ConversationId, InboundEvent, Reply};

/// Transport trait - abstraction for messaging platform connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short platform name used in logs
    fn name(&self) -> &str;

    /// Establish (or re-establish) the connection
    async fn connect(&self) -> Result<(), TransportError>;

    /// Wait for the next inbound event.
    ///
    /// `Ok(None)` means the platform closed the stream for good. Any error is
    /// treated as a dropped connection by the session. Must be cancel-safe.
    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError>;

    /// Send a reply to a conversation
    async fn send(&self, conversation: &ConversationId, reply: Reply) -> Result<(), TransportError>;

    /// Whether replies to this conversation can still be delivered
    fn is_conversation_open(&self, _conversation: &ConversationId) -> bool {
        true
    }

    /// Close the connection
    async fn disconnect(&self);
}
