//! In-memory transport for tests and embedding
//!
//! Events are pushed in by the owner; replies are recorded. Connection drops
//! and failed connects can be scripted.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use crate::application::errors::TransportError;
use crate::domain::entities::{ConversationId, InboundEvent, Reply};
use crate::domain::traits::Transport;

/// A reply the session delivered
#[derive(Debug, Clone)]
pub struct SentReply {
    pub conversation: ConversationId,
    pub reply: Reply,
}

enum Inbound {
    Event(InboundEvent),
    Drop(String),
    End,
}

pub struct MemoryTransport {
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    sent: Mutex<Vec<SentReply>>,
    sent_notify: Notify,
    closed: Mutex<HashSet<ConversationId>>,
    connects: AtomicU32,
    failing_connects: AtomicU32,
    connected: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            closed: Mutex::new(HashSet::new()),
            connects: AtomicU32::new(0),
            failing_connects: AtomicU32::new(0),
            connected: AtomicBool::new(false),
        }
    }

    /// Queue a message from `conversation`
    pub fn push(&self, conversation: &str, text: &str) {
        self.push_event(InboundEvent::new(conversation, text));
    }

    pub fn push_event(&self, event: InboundEvent) {
        let _ = self.inbound_tx.send(Inbound::Event(event));
    }

    /// The next read after everything queued so far fails as a dropped connection
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.inbound_tx.send(Inbound::Drop(reason.to_string()));
    }

    /// End the event stream after everything queued so far
    pub fn finish(&self) {
        let _ = self.inbound_tx.send(Inbound::End);
    }

    /// Make the next `count` connect calls fail
    pub fn fail_next_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn close_conversation(&self, conversation: &str) {
        if let Ok(mut closed) = self.closed.lock() {
            closed.insert(ConversationId::new(conversation));
        }
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentReply> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Wait until at least `count` replies were sent, or `timeout` passes.
    /// Returns whatever was sent by then.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<SentReply> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.sent_notify.notified();
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.sent();
            }
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        let mut inbound = self.inbound_rx.lock().await;
        match inbound.recv().await {
            Some(Inbound::Event(event)) => Ok(Some(event)),
            Some(Inbound::Drop(reason)) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(TransportError::Disconnected(reason))
            }
            Some(Inbound::End) | None => Ok(None),
        }
    }

    async fn send(&self, conversation: &ConversationId, reply: Reply) -> Result<(), TransportError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::Send("reply log poisoned".to_string()))?;
        sent.push(SentReply {
            conversation: conversation.clone(),
            reply,
        });
        drop(sent);

        self.sent_notify.notify_waiters();
        Ok(())
    }

    fn is_conversation_open(&self, conversation: &ConversationId) -> bool {
        self.closed
            .lock()
            .map(|closed| !closed.contains(conversation))
            .unwrap_or(true)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_events() {
        let transport = MemoryTransport::new();
        transport.push("a", "hello");
        transport.drop_connection("reset");
        transport.finish();

        transport.connect().await.unwrap();
        assert_eq!(transport.next_event().await.unwrap().unwrap().text, "hello");
        assert!(matches!(transport.next_event().await, Err(TransportError::Disconnected(_))));
        assert!(!transport.is_connected());
        assert!(transport.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_connects() {
        let transport = MemoryTransport::new();
        transport.fail_next_connects(2);

        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_sent() {
        let transport = std::sync::Arc::new(MemoryTransport::new());
        let sender = {
            let transport = transport.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                transport.send(&"a".into(), Reply::text("one")).await.unwrap();
            })
        };

        let sent = transport.wait_for_sent(1, Duration::from_secs(2)).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply.as_text(), Some("one"));
        sender.await.unwrap();

        let sent = transport.wait_for_sent(5, Duration::from_millis(10)).await;
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn test_closed_conversations() {
        let transport = MemoryTransport::new();
        transport.close_conversation("gone");
        assert!(!transport.is_conversation_open(&"gone".into()));
        assert!(transport.is_conversation_open(&"here".into()));
    }
}
