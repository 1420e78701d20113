//! Inbound chat events as delivered by the host bot framework.

use {
    serde::{Deserialize, Deserializer},
    serde_json::{Map, Value},
};

use crate::serialize::{ToPlain, fields};

/// An event carrying one chat message.
pub trait InboundEvent {
    fn message(&self) -> &MessagePayload;
    fn sender_id(&self) -> String;
}

/// Delivery channel of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Value")]
pub enum MessageType {
    GroupMessage,
    FriendMessage,
    #[default]
    OtherMessage,
    /// A channel name this crate has no variant for, kept verbatim.
    Other(String),
}

impl MessageType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::GroupMessage => "GroupMessage",
            Self::FriendMessage => "FriendMessage",
            Self::OtherMessage => "OtherMessage",
            Self::Other(name) => name,
        }
    }
}

impl From<Value> for MessageType {
    fn from(value: Value) -> Self {
        let Some(name) = identifier(value) else {
            return Self::default();
        };
        match name.as_str() {
            "GroupMessage" => Self::GroupMessage,
            "FriendMessage" => Self::FriendMessage,
            "OtherMessage" => Self::OtherMessage,
            _ => Self::Other(name),
        }
    }
}

impl ToPlain for MessageType {
    fn to_plain(&self) -> Value {
        self.as_str().to_plain()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct MessageMember {
    pub user_id: String,
    pub nickname: Option<String>,
    pub extra: Map<String, Value>,
}

impl From<Value> for MessageMember {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut map) => Self {
                user_id: map
                    .remove("user_id")
                    .and_then(identifier)
                    .unwrap_or_default(),
                nickname: map.remove("nickname").and_then(identifier),
                extra: map,
            },
            // A bare identifier in place of the member object.
            other => Self {
                user_id: identifier(other).unwrap_or_default(),
                ..Self::default()
            },
        }
    }
}

impl ToPlain for MessageMember {
    fn to_plain(&self) -> Value {
        let mut entries = extra_entries(&self.extra);
        entries.push(("user_id", self.user_id.to_plain()));
        entries.push(("nickname", self.nickname.to_plain()));
        fields(entries)
    }
}

/// Object-store coordinates of an attachment as announced by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub url: Option<String>,
    pub file: Option<String>,
    /// Host-specific fields this crate does not interpret.
    pub extra: Map<String, Value>,
}

/// One element of a message's content list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Component {
    Text {
        data: Option<String>,
        extra: Map<String, Value>,
    },
    Image(Attachment),
    Video(Attachment),
    File(Attachment),
    /// Any component kind without a dedicated variant, kept field by field.
    /// `kind` is `None` when the element carries no `type`.
    Other {
        kind: Option<String>,
        fields: Map<String, Value>,
    },
}

impl Component {
    /// The `type` discriminator.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => Some("Text"),
            Self::Image(_) => Some("Image"),
            Self::Video(_) => Some("Video"),
            Self::File(_) => Some("File"),
            Self::Other { kind, .. } => kind.as_deref(),
        }
    }

    #[must_use]
    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Image(_) | Self::Video(_) | Self::File(_))
    }
}

impl From<Value> for Component {
    fn from(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".into(), other);
                return Self::Other {
                    kind: None,
                    fields: map,
                };
            },
        };
        let kind = map.remove("type").and_then(identifier);
        let take_text =
            |map: &mut Map<String, Value>, key: &str| map.remove(key).and_then(identifier);

        match kind.as_deref() {
            Some("Text") => Self::Text {
                data: take_text(&mut map, "data"),
                extra: map,
            },
            Some(name @ ("Image" | "Video" | "File")) => {
                let attachment = Attachment {
                    url: take_text(&mut map, "url"),
                    file: take_text(&mut map, "file"),
                    extra: map,
                };
                match name {
                    "Image" => Self::Image(attachment),
                    "Video" => Self::Video(attachment),
                    _ => Self::File(attachment),
                }
            },
            _ => Self::Other { kind, fields: map },
        }
    }
}

impl ToPlain for Component {
    fn to_plain(&self) -> Value {
        let mut entries = match self {
            Self::Text { data, extra } => {
                let mut entries = extra_entries(extra);
                push_present(&mut entries, "data", data);
                entries
            },
            Self::Image(a) | Self::Video(a) | Self::File(a) => {
                let mut entries = extra_entries(&a.extra);
                push_present(&mut entries, "url", &a.url);
                push_present(&mut entries, "file", &a.file);
                entries
            },
            Self::Other { fields: extra, .. } => extra_entries(extra),
        };
        if let Some(kind) = self.kind() {
            entries.push(("type", kind.to_plain()));
        }
        fields(entries)
    }
}

/// The message object of an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagePayload {
    #[serde(deserialize_with = "lenient_identifier")]
    pub message_id: String,
    #[serde(deserialize_with = "optional_lenient_identifier")]
    pub session_id: Option<String>,
    #[serde(deserialize_with = "optional_lenient_identifier")]
    pub group_id: Option<String>,
    #[serde(deserialize_with = "optional_lenient_identifier")]
    pub self_id: Option<String>,
    /// As sent; normalized to epoch seconds when stored.
    pub timestamp: Value,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender: MessageMember,
    pub message_str: String,
    /// Platform-native form of the message, stored untouched.
    pub raw_message: Value,
    pub message: Vec<Component>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToPlain for MessagePayload {
    fn to_plain(&self) -> Value {
        let mut entries = extra_entries(&self.extra);
        entries.extend([
            ("message_id", self.message_id.to_plain()),
            ("session_id", self.session_id.to_plain()),
            ("group_id", self.group_id.to_plain()),
            ("self_id", self.self_id.to_plain()),
            ("timestamp", self.timestamp.to_plain()),
            ("type", self.message_type.to_plain()),
            ("sender", self.sender.to_plain()),
            ("message_str", self.message_str.to_plain()),
            ("raw_message", self.raw_message.to_plain()),
            ("message", self.message.to_plain()),
        ]);
        fields(entries)
    }
}

/// A JSON-decoded chat event.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatEvent {
    #[serde(default, deserialize_with = "optional_lenient_identifier")]
    pub sender_id: Option<String>,
    pub message: MessagePayload,
}

impl InboundEvent for ChatEvent {
    fn message(&self) -> &MessagePayload {
        &self.message
    }

    /// Falls back to the payload's sender when the event names none.
    fn sender_id(&self) -> String {
        self.sender_id
            .clone()
            .unwrap_or_else(|| self.message.sender.user_id.clone())
    }
}

fn extra_entries(extra: &Map<String, Value>) -> Vec<(&str, Value)> {
    extra.iter().map(|(k, v)| (k.as_str(), v.clone())).collect()
}

fn push_present<'a>(entries: &mut Vec<(&'a str, Value)>, key: &'a str, value: &Option<String>) {
    if let Some(value) = value {
        entries.push((key, value.to_plain()));
    }
}

/// Text form of an identifier. Strings pass through, other shapes keep
/// their JSON text, null is absent.
fn identifier(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    optional_lenient_identifier(deserializer).map(Option::unwrap_or_default)
}

fn optional_lenient_identifier<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Value::deserialize(deserializer).map(identifier)
}
