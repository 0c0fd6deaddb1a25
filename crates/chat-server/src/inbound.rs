use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message received from a client.
///
/// Clients normally send `{"username": "...", "message": "..."}`. Anything
/// that does not parse as that object is taken verbatim as the message text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
}

impl InboundMessage {
    /// Parse a raw payload. `current_username` fills the name for plain-text
    /// payloads.
    pub fn parse(payload: &str, current_username: Option<&str>) -> Self {
        // The derived deserializer also accepts sequences; only objects count.
        let parsed = match serde_json::from_str::<Value>(payload) {
            Ok(value @ Value::Object(_)) => serde_json::from_value::<InboundMessage>(value).ok(),
            _ => None,
        };

        parsed.unwrap_or_else(|| Self {
            username: current_username.unwrap_or_default().to_string(),
            message: payload.to_string(),
        })
    }
}
