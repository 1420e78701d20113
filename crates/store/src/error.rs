use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached or the URI is malformed.
    #[error("database connection failed: {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    /// The URI scheme names a backend this crate does not speak.
    #[error("unsupported database backend: {scheme}")]
    UnsupportedBackend { scheme: String },

    /// The backend rejected a read or write.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn connection(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connection {
            context: context.into(),
            source,
        }
    }

    #[must_use]
    pub fn unsupported_backend(scheme: impl Into<String>) -> Self {
        Self::UnsupportedBackend {
            scheme: scheme.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
