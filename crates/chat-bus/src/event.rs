use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle naming one bus subscriber, e.g. `obs_7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubscriberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The category of a [`ChatEvent`]. Serialised as the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    UserJoin,
    UserLeave,
    System,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::UserJoin => "user_join",
            Self::UserLeave => "user_leave",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event flowing through the bus.
///
/// Events are built by the publisher, owned by the bus until dispatch, and
/// then shared read-only by `Arc` across every delivery. The serialised form
/// is the subscriber-facing wire payload:
///
/// ```json
/// {"type":"message","message":"hi","username":"ana","data":{...},"timestamp":"..."}
/// ```
///
/// `origin` and `recipient` are routing metadata and never leave the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "message", default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(
        rename = "data",
        default,
        skip_serializing_if = "serde_json::Map::is_empty"
    )]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    /// Subscriber that caused the event, if any.
    #[serde(skip)]
    pub origin: Option<SubscriberId>,
    /// When set, only this subscriber's mailbox delivers the event.
    #[serde(skip)]
    pub recipient: Option<SubscriberId>,
}

impl ChatEvent {
    /// Create an event of `kind` stamped with the current UTC time.
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            username: None,
            attributes: serde_json::Map::new(),
            timestamp: Utc::now(),
            origin: None,
            recipient: None,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::new(EventKind::Message, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(EventKind::System, text)
    }

    pub fn with_origin(mut self, origin: SubscriberId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set the display name. Empty names are treated as absent.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into();
        self.username = (!username.is_empty()).then_some(username);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Restrict delivery to a single subscriber.
    pub fn addressed_to(mut self, recipient: SubscriberId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Whether a subscriber named `id` should deliver this event.
    pub fn is_for(&self, id: &SubscriberId) -> bool {
        match &self.recipient {
            Some(recipient) => recipient == id,
            None => true,
        }
    }

    /// Serialise to the JSON text frame sent to clients.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_client_field_names() {
        let event = ChatEvent::message("hola")
            .with_username("ana")
            .with_origin(SubscriberId::from("obs_1"))
            .with_attribute("sender_id", "obs_1");

        let json: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["message"], "hola");
        assert_eq!(json["username"], "ana");
        assert_eq!(json["data"]["sender_id"], "obs_1");
        assert!(json["timestamp"].is_string());
        assert!(json.get("origin").is_none());
        assert!(json.get("recipient").is_none());
    }

    #[test]
    fn empty_fields_are_omitted() {
        let event = ChatEvent::new(EventKind::UserLeave, "").with_username("");
        let json: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(json["type"], "user_leave");
        assert!(json.get("message").is_none());
        assert!(json.get("username").is_none());
        assert!(json.get("data").is_none());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let event = ChatEvent::system("x");
        let json: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "not RFC 3339: {ts}");
    }

    #[test]
    fn addressing() {
        let a = SubscriberId::from("obs_1");
        let b = SubscriberId::from("obs_2");

        let broadcast = ChatEvent::system("all");
        assert!(broadcast.is_for(&a) && broadcast.is_for(&b));

        let direct = ChatEvent::system("only a").addressed_to(a.clone());
        assert!(direct.is_for(&a));
        assert!(!direct.is_for(&b));
    }

    #[test]
    fn kind_names_match_wire() {
        for kind in [
            EventKind::Message,
            EventKind::UserJoin,
            EventKind::UserLeave,
            EventKind::System,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
