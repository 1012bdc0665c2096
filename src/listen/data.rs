use serde_json::Value;

/// One inbound chat occurrence. Transient: produced per frame, handed to
/// the dispatcher, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub kind: EventKind,
    pub content: String,
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    Other,
}

/// The live connection state, owned exclusively by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Dispatching,
}

// The remote schema is not guaranteed stable; probe a few spellings before
// giving an event up.
const TEXT_KEYS: [&str; 3] = ["content", "text", "message"];
const SENDER_KEYS: [&str; 3] = ["displayname", "displayName", "username"];

/// Extracts chat events from one inbound `data` frame. Frames that carry no
/// recognizable message produce nothing; that is not an error.
#[must_use]
pub fn events_from_frame(frame: &Value) -> Vec<ChatEvent> {
    let Some(data) = frame.pointer("/payload/data") else {
        return Vec::new();
    };
    let received = data
        .get("streamMessageReceived")
        .or_else(|| data.as_object().and_then(|fields| fields.values().next()));

    match received {
        Some(Value::Array(messages)) => messages.iter().filter_map(event_from_message).collect(),
        Some(message @ Value::Object(_)) => event_from_message(message).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn event_from_message(message: &Value) -> Option<ChatEvent> {
    let fields = message.as_object()?;
    let typename = fields.get("__typename").and_then(Value::as_str);
    let content = TEXT_KEYS
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str));
    let sender = sender_name(message);

    match (typename, content) {
        (Some("ChatText") | None, Some(content)) => Some(ChatEvent {
            kind: EventKind::Text,
            content: String::from(content),
            sender,
        }),
        (Some(_), content) => Some(ChatEvent {
            kind: EventKind::Other,
            content: String::from(content.unwrap_or_default()),
            sender,
        }),
        (None, None) => None,
    }
}

fn sender_name(message: &Value) -> Option<String> {
    message
        .get("sender")
        .and_then(|sender| {
            SENDER_KEYS
                .iter()
                .find_map(|key| sender.get(*key).and_then(Value::as_str))
        })
        .or_else(|| message.get("senderUsername").and_then(Value::as_str))
        .map(String::from)
}
