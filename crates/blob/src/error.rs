use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The endpoint is unreachable or malformed.
    #[error("object store connection failed: {message}")]
    Connection { message: String },

    /// An operation was attempted before `connect()` succeeded.
    #[error("object store client is not initialized, call connect() first")]
    NotInitialized,

    /// The backend rejected a request.
    #[error("object store request failed: {context}: {message}")]
    Storage { context: String, message: String },

    /// Transport failure while talking to the backend.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn storage(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            context: context.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
