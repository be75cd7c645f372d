//! Bot session - connection lifecycle and event processing
//!
//! Events are read from the transport by one loop and handed to a fixed set
//! of workers over a bounded queue. Replies go through a single sender task,
//! which drops replies for conversations the transport reports as closed.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use super::backoff::ReconnectPolicy;
use crate::application::errors::BotError;
use crate::application::messaging::Dispatcher;
use crate::domain::entities::{ConversationId, InboundEvent, Reply};
use crate::domain::traits::Transport;
use crate::infrastructure::config::SessionConfig;

/// Connection state, observable through [`BotSession::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub event_workers: usize,
    pub event_queue_depth: usize,
    pub drain_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            event_workers: config.event_workers,
            event_queue_depth: config.event_queue_depth,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            reconnect: ReconnectPolicy::from(&config.reconnect),
        }
    }
}

struct Outbound {
    conversation: ConversationId,
    reply: Reply,
}

pub struct BotSession<T: Transport> {
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher>,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
    drain_deadline: StdMutex<Option<Instant>>,
}

impl<T: Transport> BotSession<T> {
    pub fn new(transport: Arc<T>, dispatcher: Arc<Dispatcher>, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            transport,
            dispatcher,
            settings,
            state,
            drain_deadline: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// When the drain that began at shutdown runs out, once it has begun
    pub fn drain_deadline(&self) -> Option<Instant> {
        *self.drain_deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain time left for anything shutting down after the session.
    ///
    /// Everything after the session shares one drain timeout, so this is what
    /// remains of it, or the whole timeout if the session never drained.
    pub fn remaining_drain(&self) -> Duration {
        match self.drain_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => self.settings.drain_timeout,
        }
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!("Session {:?} -> {:?}", previous, next);
        }
    }

    /// Run until shutdown is signalled, the transport ends its event stream,
    /// or reconnecting gives up.
    ///
    /// Setting `shutdown` to true stops intake; events already queued are
    /// handled for up to the drain timeout before the transport disconnects.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), BotError> {
        self.set_state(SessionState::Connecting);
        if !self.establish(&mut shutdown, true).await? {
            self.set_state(SessionState::Disconnected);
            return Ok(());
        }

        let depth = self.settings.event_queue_depth.max(1);
        let (event_tx, event_rx) = mpsc::channel::<InboundEvent>(depth);
        let (reply_tx, reply_rx) = mpsc::channel::<Outbound>(depth);
        let event_rx = Arc::new(Mutex::new(event_rx));

        let mut workers = JoinSet::new();
        for id in 0..self.settings.event_workers.max(1) {
            workers.spawn(event_worker(id, self.dispatcher.clone(), event_rx.clone(), reply_tx.clone()));
        }
        drop(reply_tx);
        let sender = tokio::spawn(send_replies(self.transport.clone(), reply_rx));

        let result = self.read_events(&event_tx, &mut shutdown).await;
        drop(event_tx);

        self.drain(workers, sender).await;
        self.transport.disconnect().await;
        self.set_state(SessionState::Disconnected);

        result
    }

    async fn read_events(
        &self,
        events: &mpsc::Sender<InboundEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), BotError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    tracing::info!("Shutdown requested, no longer accepting events");
                    return Ok(());
                }
                next = self.transport.next_event() => next,
            };

            match next {
                Ok(Some(event)) => {
                    tracing::debug!("[{}] {}", event.conversation, event.text.chars().take(50).collect::<String>());
                    tokio::select! {
                        sent = events.send(event) => {
                            if sent.is_err() {
                                return Ok(());
                            }
                        }
                        _ = shutdown_requested(shutdown) => return Ok(()),
                    }
                }
                Ok(None) => {
                    tracing::info!("{} closed the event stream", self.transport.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Lost connection to {}: {}", self.transport.name(), e);
                    self.set_state(SessionState::Reconnecting);
                    if !self.establish(shutdown, false).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Connect with backoff. Ok(false) means shutdown arrived first.
    async fn establish(&self, shutdown: &mut watch::Receiver<bool>, immediate: bool) -> Result<bool, BotError> {
        let policy = &self.settings.reconnect;
        let first = if immediate { 0 } else { 1 };

        for attempt in first..=policy.max_attempts {
            let delay = policy.delay(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_requested(shutdown) => return Ok(false),
                }
            }

            match self.transport.connect().await {
                Ok(()) => {
                    self.set_state(SessionState::Connected);
                    tracing::info!("Connected to {}", self.transport.name());
                    return Ok(true);
                }
                Err(e) => tracing::warn!(
                    "Connect attempt {}/{} to {} failed: {}",
                    attempt,
                    policy.max_attempts,
                    self.transport.name(),
                    e
                ),
            }
        }

        self.set_state(SessionState::Disconnected);
        tracing::error!("Giving up on {} after {} attempts", self.transport.name(), policy.max_attempts);
        Err(BotError::ConnectionLost {
            attempts: policy.max_attempts,
        })
    }

    async fn drain(&self, mut workers: JoinSet<()>, mut sender: JoinHandle<()>) {
        let timeout = self.settings.drain_timeout;
        let deadline = Instant::now() + timeout;
        *self.drain_deadline.lock().unwrap_or_else(PoisonError::into_inner) = Some(deadline);

        let drained = tokio::time::timeout_at(deadline, async {
            while workers.join_next().await.is_some() {}
            let _ = (&mut sender).await;
        })
        .await;

        if drained.is_err() {
            tracing::warn!("In-flight events did not finish within {:?}, abandoning them", timeout);
            workers.abort_all();
            sender.abort();
        }
    }
}

async fn event_worker(
    id: usize,
    dispatcher: Arc<Dispatcher>,
    events: Arc<Mutex<mpsc::Receiver<InboundEvent>>>,
    replies: mpsc::Sender<Outbound>,
) {
    loop {
        let event = events.lock().await.recv().await;
        let Some(event) = event else {
            break;
        };

        let outcome = dispatcher.handle_event(&event).await;
        if let Some(reply) = dispatcher.reply_for(outcome) {
            let outbound = Outbound {
                conversation: event.conversation,
                reply,
            };
            if replies.send(outbound).await.is_err() {
                break;
            }
        }
    }
    tracing::debug!("Event worker {} stopped", id);
}

async fn send_replies<T: Transport>(transport: Arc<T>, mut replies: mpsc::Receiver<Outbound>) {
    while let Some(Outbound { conversation, reply }) = replies.recv().await {
        if !transport.is_conversation_open(&conversation) {
            tracing::debug!("Discarding reply for closed conversation {}", conversation);
            continue;
        }
        if let Err(e) = transport.send(&conversation, reply).await {
            tracing::warn!("Failed to send reply to {}: {}", conversation, e);
        }
    }
}

/// Resolves once shutdown is requested; a dropped sender never resolves
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
