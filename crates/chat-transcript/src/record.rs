use chat_bus::ChatEvent;
use serde::{Deserialize, Serialize};

/// One line of the transcript: the event as clients saw it plus the routing
/// metadata that never goes over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: uuid::Uuid,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Events lost between the previous line and this one.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dropped_before: u64,
    pub event: ChatEvent,
}

impl TranscriptRecord {
    /// Snapshot `event` with a fresh UUID v4 and the current UTC time.
    pub fn new(event: &ChatEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            recorded_at: chrono::Utc::now(),
            origin: event.origin.as_ref().map(|id| id.to_string()),
            recipient: event.recipient.as_ref().map(|id| id.to_string()),
            dropped_before: 0,
            event: event.clone(),
        }
    }

    /// Closing line for a transcript whose last `dropped` events never
    /// reached the writer.
    pub fn trailing_gap(dropped: u64) -> Self {
        let event = ChatEvent::system(format!("{dropped} events were not recorded"))
            .with_attribute("transcript_gap", dropped);
        Self {
            dropped_before: dropped,
            ..Self::new(&event)
        }
    }

    pub fn has_gap(&self) -> bool {
        self.dropped_before > 0
    }
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_is_omitted_from_json_when_zero() {
        let json = serde_json::to_value(TranscriptRecord::new(&ChatEvent::message("hola"))).unwrap();
        assert!(json.get("dropped_before").is_none());
        assert_eq!(json["event"]["message"], "hola");
    }

    #[test]
    fn trailing_gap_is_a_system_event() {
        let record = TranscriptRecord::trailing_gap(3);
        assert!(record.has_gap());
        assert_eq!(record.event.text, "3 events were not recorded");
        assert_eq!(record.event.attributes["transcript_gap"], 3);
    }
}
