//! Relational archive of chat messages.
//!
//! Three tables (`messages`, `message_components`, `files`) over PostgreSQL,
//! MySQL or SQLite through one `sqlx::AnyPool`. The backend dialect is picked
//! from the connection URI at startup and decides how the raw message payload
//! column is stored.

pub mod dialect;
pub mod error;
pub mod models;
pub mod schema;
pub mod session;
pub mod store;

pub use {
    dialect::{Dialect, PayloadEncoding},
    error::{Error, Result},
    models::{
        ComponentRecord, FileRecord, MessageRecord, NewComponent, NewFile, NewMessage,
        decode_payload,
    },
    session::Session,
    store::Store,
};
