use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chat_bus::{ChatEvent, EventBus, EventKind, Mailbox, SubscriberId, DEFAULT_MAILBOX_CAPACITY};
use chat_moderation::{ModerationContext, ModerationVerdict};
use chat_stats::StatsAggregator;
use futures_util::Sink;
use tracing::{debug, info, warn};

use crate::inbound::InboundMessage;

/// Tunables for [`ChatServer`].
#[derive(Debug, Clone)]
pub struct ChatServerConfig {
    /// Per-connection outbound queue size.
    pub mailbox_capacity: usize,
}

impl Default for ChatServerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) bus: EventBus,
    pub(crate) moderation: Arc<ModerationContext>,
    pub(crate) stats: Arc<StatsAggregator>,
    sessions: RwLock<HashMap<SubscriberId, Arc<Mailbox>>>,
    next_id: AtomicU64,
    config: ChatServerConfig,
}

impl Inner {
    /// Publish and forget. The bus has already logged and counted a drop.
    pub(crate) fn publish(&self, event: ChatEvent) {
        if let Err(err) = self.bus.publish(event) {
            debug!(%err, "event not published");
        }
    }
}

/// Coordinates client sessions around one event bus.
///
/// Cheap to clone; every clone refers to the same server.
#[derive(Clone)]
pub struct ChatServer {
    pub(crate) inner: Arc<Inner>,
}

impl ChatServer {
    /// Build a server on `bus` and register `stats` as a bus subscriber.
    pub fn new(
        bus: EventBus,
        moderation: Arc<ModerationContext>,
        stats: Arc<StatsAggregator>,
        config: ChatServerConfig,
    ) -> Self {
        bus.subscribe(SubscriberId::from(StatsAggregator::ID), stats.clone());
        Self {
            inner: Arc::new(Inner {
                bus,
                moderation,
                stats,
                sessions: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Register a new client whose outbound frames go to `sink`.
    ///
    /// The client is subscribed before the join event is published, so it
    /// sees its own join.
    pub fn connect<S>(&self, sink: S) -> Session
    where
        S: Sink<String> + Send + 'static,
        S::Error: Display,
    {
        let inner = &self.inner;
        let id = SubscriberId::from(format!(
            "obs_{}",
            inner.next_id.fetch_add(1, Ordering::Relaxed)
        ));

        let (mailbox, _drain) = Mailbox::start(
            id.clone(),
            sink,
            inner.config.mailbox_capacity,
            Arc::clone(inner.bus.metrics()),
        );
        let mailbox = Arc::new(mailbox);

        inner.bus.subscribe(id.clone(), mailbox.clone());
        inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&mailbox));

        inner.publish(
            ChatEvent::new(EventKind::UserJoin, "User connected")
                .with_origin(id.clone())
                .with_attribute("observer_id", id.as_str()),
        );

        info!(subscriber_id = %id, "client connected");

        Session {
            id,
            username: None,
            mailbox,
            server: self.clone(),
            closed: false,
        }
    }

    /// Number of sessions currently connected.
    pub fn connection_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn moderation(&self) -> &Arc<ModerationContext> {
        &self.inner.moderation
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.inner.stats
    }

    /// Close every connected client's mailbox. Sessions still tear down
    /// normally when their transports end.
    pub fn shutdown(&self) {
        let sessions = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for mailbox in sessions.values() {
            mailbox.close();
        }
        info!(connections = sessions.len(), "closed all client mailboxes");
    }
}

/// One connected client.
///
/// Dropping a session without calling [`disconnect`](Self::disconnect)
/// performs the same teardown.
pub struct Session {
    id: SubscriberId,
    username: Option<String>,
    mailbox: Arc<Mailbox>,
    server: ChatServer,
    closed: bool,
}

impl Session {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Last non-empty username the client sent.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Moderate one inbound payload and publish the outcome.
    ///
    /// Blocked messages are never published; the sender alone receives a
    /// system notice. A `Modify` verdict publishes the rewritten text; any
    /// other verdict publishes the original text.
    pub fn handle_inbound(&mut self, payload: &str) -> ModerationVerdict {
        let inner = &self.server.inner;
        let inbound = InboundMessage::parse(payload, self.username.as_deref());

        if !inbound.username.is_empty() {
            self.username = Some(inbound.username.clone());
        }

        let verdict = inner.moderation.moderate(&inbound.message);

        match verdict.effective_text() {
            None => {
                warn!(
                    subscriber_id = %self.id,
                    strategy = %verdict.strategy_used,
                    reason = %verdict.reason,
                    "message blocked"
                );
                inner.publish(
                    ChatEvent::system(format!("Your message was blocked: {}", verdict.reason))
                        .with_origin(self.id.clone())
                        .addressed_to(self.id.clone())
                        .with_attribute("blocked_message", true)
                        .with_attribute("sender_id", self.id.as_str()),
                );
            }
            Some(text) => {
                if text != verdict.original_message {
                    info!(
                        subscriber_id = %self.id,
                        original = %verdict.original_message,
                        moderated = %text,
                        "message moderated"
                    );
                }
                let chat_message = serde_json::json!({
                    "username": inbound.username,
                    "message": inbound.message,
                });
                inner.publish(
                    ChatEvent::message(text)
                        .with_username(self.username.clone().unwrap_or_default())
                        .with_origin(self.id.clone())
                        .with_attribute("chat_message", chat_message)
                        .with_attribute("sender_id", self.id.as_str())
                        .with_attribute(
                            "moderation_result",
                            serde_json::to_value(&verdict).unwrap_or_default(),
                        ),
                );
            }
        }

        verdict
    }

    /// Unsubscribe, close the mailbox and announce the departure.
    pub fn disconnect(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let inner = &self.server.inner;
        inner.bus.unsubscribe(&self.id);
        inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        self.mailbox.close();

        inner.publish(
            ChatEvent::new(EventKind::UserLeave, "User disconnected")
                .with_username(self.username.clone().unwrap_or_default())
                .with_origin(self.id.clone())
                .with_attribute("observer_id", self.id.as_str()),
        );

        info!(
            subscriber_id = %self.id,
            username = self.username.as_deref().unwrap_or("-"),
            dropped = self.mailbox.dropped(),
            "client disconnected"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
