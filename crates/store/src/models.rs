use serde_json::Value;

/// A message row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message_id: String,
    pub session_id: Option<String>,
    pub sender_id: Option<String>,
    pub timestamp: Option<i64>,
    pub raw_payload: Value,
}

/// A component row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewComponent {
    pub message_fk: i64,
    pub order_index: i64,
    pub component_type: Option<String>,
    pub component_data: Value,
}

/// An upload outcome row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub component_fk: i64,
    pub file_name: String,
    pub storage_path: String,
    pub upload_timestamp: i64,
}

/// An archived message.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: i64,
    pub message_id: String,
    pub session_id: Option<String>,
    pub sender_id: Option<String>,
    pub timestamp: Option<i64>,
    pub raw_payload: Value,
}

/// One archived element of a message's content.
#[derive(Debug, Clone)]
pub struct ComponentRecord {
    pub id: i64,
    pub message_fk: i64,
    pub order_index: i64,
    pub component_type: Option<String>,
    pub component_data: Value,
}

/// Where an attachment ended up in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub component_fk: i64,
    pub file_name: Option<String>,
    pub storage_path: Option<String>,
    pub upload_timestamp: Option<i64>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: i64,
    pub message_id: String,
    pub session_id: Option<String>,
    pub sender_id: Option<String>,
    pub timestamp: Option<i64>,
    pub raw_payload: Option<String>,
}

impl From<MessageRow> for MessageRecord {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id,
            message_id: r.message_id,
            session_id: r.session_id,
            sender_id: r.sender_id,
            timestamp: r.timestamp,
            raw_payload: decode_payload(r.raw_payload.as_deref()),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ComponentRow {
    pub id: i64,
    pub message_fk: i64,
    pub order_index: i64,
    pub component_type: Option<String>,
    pub component_data: Option<String>,
}

impl From<ComponentRow> for ComponentRecord {
    fn from(r: ComponentRow) -> Self {
        Self {
            id: r.id,
            message_fk: r.message_fk,
            order_index: r.order_index,
            component_type: r.component_type,
            component_data: decode_payload(r.component_data.as_deref()),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub id: i64,
    pub component_fk: i64,
    pub file_name: Option<String>,
    pub storage_path: Option<String>,
    pub upload_timestamp: Option<i64>,
}

impl From<FileRow> for FileRecord {
    fn from(r: FileRow) -> Self {
        Self {
            id: r.id,
            component_fk: r.component_fk,
            file_name: r.file_name,
            storage_path: r.storage_path,
            upload_timestamp: r.upload_timestamp,
        }
    }
}

/// Decode a stored JSON column read back as text.
///
/// Handles both encodings: a structured column yields the document itself,
/// while older rows may hold a JSON document serialized into a JSON string.
/// Text that is not JSON at all is returned as a string value.
pub fn decode_payload(text: Option<&str>) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(doc @ (Value::Object(_) | Value::Array(_))) => doc,
            _ => Value::String(inner),
        },
        Ok(value) => value,
        Err(_) => Value::String(text.to_string()),
    }
}
