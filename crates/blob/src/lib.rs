//! Object storage for archived attachments.
//!
//! [`BlobStore`] is the seam the uploader talks to. [`S3Client`] speaks the
//! S3 REST protocol (path-style, SigV4) to any compatible service such as
//! MinIO; [`MemoryBlobStore`] keeps objects in memory.

pub mod error;
pub mod memory;
pub mod s3;
pub mod sigv4;

use {async_trait::async_trait, bytes::Bytes};

pub use {
    error::{Error, Result},
    memory::MemoryBlobStore,
    s3::{S3Client, S3Options},
};

/// Content type used for every archived object.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Reject object names that could address something other than a plain key.
///
/// `.` and `..` segments are resolved away by URL parsing, so
/// `../other/x.png` would land in another bucket.
pub fn check_object_name(object_name: &str) -> Result<()> {
    if object_name.is_empty() {
        return Err(Error::invalid_input("object name is empty"));
    }
    if object_name
        .split(['/', '\\'])
        .any(|segment| matches!(segment, "." | ".."))
    {
        return Err(Error::invalid_input(format!(
            "object name {object_name:?} contains a dot segment"
        )));
    }
    Ok(())
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create `bucket` if it does not exist yet.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;

    /// Store `data` as `object_name` in `bucket`, replacing any previous object.
    ///
    /// `length` must equal `data.len()`.
    async fn upload(&self, bucket: &str, object_name: &str, data: Bytes, length: u64)
    -> Result<()>;
}
