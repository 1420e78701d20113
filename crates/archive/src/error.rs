#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Store(#[from] observer_store::Error),

    #[error(transparent)]
    Blob(#[from] observer_blob::Error),

    /// A write in the message/component commit sequence failed.
    #[error("failed to archive message {message_id}: {source}")]
    Transaction {
        message_id: String,
        #[source]
        source: observer_store::Error,
    },

    #[error("event has no usable message_id")]
    MissingMessageId,

    #[error("component {component_id} has no {field}")]
    MissingField {
        component_id: i64,
        field: &'static str,
    },

    #[error("download of {url} failed with status {status}")]
    DownloadFailure { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout {
        operation: &'static str,
        seconds: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transaction(message_id: impl Into<String>, source: observer_store::Error) -> Self {
        Self::Transaction {
            message_id: message_id.into(),
            source,
        }
    }

    #[must_use]
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
