use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Tag of a stream event.
///
/// The well-known tags get their own variants; anything else is carried
/// verbatim in `Custom` so that relays stay agnostic to payload semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProgressChar,
    Progress,
    Token,
    Result,
    Done,
    Error,
    Custom(String),
}

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Success,
    Failure,
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ProgressChar => "progress_char",
            EventKind::Progress => "progress",
            EventKind::Token => "token",
            EventKind::Result => "result",
            EventKind::Done => "done",
            EventKind::Error => "error",
            EventKind::Custom(name) => name.as_str(),
        }
    }

    /// `result` and `done` end a stream successfully, `error` ends it with a failure.
    pub fn terminal(&self) -> Option<Terminal> {
        match self {
            EventKind::Result | EventKind::Done => Some(Terminal::Success),
            EventKind::Error => Some(Terminal::Failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "progress_char" => EventKind::ProgressChar,
            "progress" => EventKind::Progress,
            "token" => EventKind::Token,
            "result" => EventKind::Result,
            "done" => EventKind::Done,
            "error" => EventKind::Error,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::from(name.as_str())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventKind::from(name))
    }
}

/// One event of a stream. `seq` is the position assigned by the producing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub seq: u64,
    #[serde(default)]
    pub payload: Value,
}

impl StreamEvent {
    /// `Custom` kinds spelling a well-known name are folded into their variant.
    pub fn new(kind: impl Into<EventKind>, seq: u64, payload: Value) -> Self {
        let kind = match kind.into() {
            EventKind::Custom(name) => EventKind::from(name),
            known => known,
        };
        Self {
            kind,
            seq,
            payload,
        }
    }

    /// Terminal failure event carrying an error description and its taxonomy code
    pub fn error(seq: u64, message: impl Into<String>, code: &str) -> Self {
        Self::new(
            EventKind::Error,
            seq,
            serde_json::json!({ "error": message.into(), "code": code }),
        )
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.kind.terminal()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Error description of a failure event, if any
    pub fn error_message(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kinds_survive_serialization() {
        let event = StreamEvent::new("heartbeat", 4, json!({ "n": 1 }));
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"kind\":\"heartbeat\""));

        let back: StreamEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.kind, EventKind::Custom("heartbeat".to_string()));
        assert!(!back.is_terminal());
    }

    #[test]
    fn terminal_classification() {
        assert_eq!(EventKind::Result.terminal(), Some(Terminal::Success));
        assert_eq!(EventKind::Done.terminal(), Some(Terminal::Success));
        assert_eq!(EventKind::Error.terminal(), Some(Terminal::Failure));
        assert_eq!(EventKind::Progress.terminal(), None);
        assert_eq!(EventKind::from("token"), EventKind::Token);
    }

    #[test]
    fn custom_names_of_known_kinds_are_folded() {
        let event = StreamEvent::new(EventKind::Custom("done".to_string()), 3, json!({}));
        assert_eq!(event.kind, EventKind::Done);
        assert!(event.is_terminal());

        let text = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.terminal(), event.terminal());

        let custom = StreamEvent::new(EventKind::Custom("heartbeat".to_string()), 4, json!({}));
        assert_eq!(custom.kind, EventKind::Custom("heartbeat".to_string()));
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let event: StreamEvent = serde_json::from_str(r#"{"kind":"done","seq":2}"#).unwrap();
        assert_eq!(event.payload, Value::Null);
        assert_eq!(event.terminal(), Some(Terminal::Success));
    }

    #[test]
    fn error_event_exposes_message() {
        let event = StreamEvent::error(7, "upstream went away", "upstream_closed");
        assert_eq!(event.error_message(), Some("upstream went away"));
        assert_eq!(event.payload["code"], "upstream_closed");
    }
}
