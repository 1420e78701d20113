//! Archival of inbound chat messages.
//!
//! [`Archiver::ingest`] turns an [`InboundEvent`] into a `messages` row plus
//! one ordered `message_components` row per content element, committing each
//! row as it goes. Image, video and file components are handed to the
//! [`AttachmentUploader`], which copies them into the object store in the
//! background and records a `files` row once the copy succeeded.

pub mod error;
pub mod event;
pub mod pipeline;
pub mod serialize;
pub mod source;
pub mod uploader;

pub use {
    error::{Error, Result},
    event::{
        Attachment, ChatEvent, Component, InboundEvent, MessageMember, MessagePayload, MessageType,
    },
    pipeline::{ATTACHMENT_TYPES, Archiver, IngestReport, connect_blob, is_attachment_type},
    serialize::{ToPlain, textual},
    source::JsonLinesSource,
    uploader::{AttachmentUploader, StoredFile, UploadJob, UploaderOptions},
};
