use std::sync::Arc;

use {
    observer_blob::{BlobStore, S3Client, S3Options},
    observer_config::{ObserverConfig, Severity, validate},
    observer_store::{NewComponent, NewMessage, Session, Store},
    secrecy::Secret,
    serde_json::Value,
    tracing::{debug, error, info, warn},
};

use crate::{
    Error, Result,
    event::InboundEvent,
    serialize::ToPlain,
    uploader::{AttachmentUploader, UploadJob, UploaderOptions},
};

/// Component types whose binary content is copied into the object store.
pub const ATTACHMENT_TYPES: &[&str] = &["Image", "Video", "File"];

#[must_use]
pub fn is_attachment_type(component_type: &str) -> bool {
    ATTACHMENT_TYPES.contains(&component_type)
}

/// What one successful ingestion wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub message_id: String,
    /// Surrogate key of the `messages` row.
    pub message_pk: i64,
    /// Surrogate keys of the component rows, in `order_index` order.
    pub component_ids: Vec<i64>,
    pub uploads_scheduled: usize,
}

/// Writes inbound messages into the archive.
pub struct Archiver {
    store: Store,
    uploader: AttachmentUploader,
}

impl Archiver {
    #[must_use]
    pub fn new(store: Store, uploader: AttachmentUploader) -> Self {
        Self { store, uploader }
    }

    /// Connect both backends and prepare schema and bucket.
    ///
    /// Any failure here is fatal; no events should be processed without an
    /// archiver.
    pub async fn initialize(config: &ObserverConfig) -> Result<Self> {
        let report = validate(config);
        if report.has_errors() {
            let problems: Vec<String> = report
                .diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(|d| format!("{}: {}", d.path, d.message))
                .collect();
            return Err(Error::config(problems.join("; ")));
        }

        let store = Store::create_engine(
            &config.database.connection_uri(),
            config.database.max_connections,
        )
        .await?;
        store.initialize_schema().await?;
        info!(backend = %config.database.backend, "message store ready");

        let blob = connect_blob(config).await?;
        info!(bucket = %config.blob.bucket, "object store ready");

        let uploader =
            AttachmentUploader::new(store.clone(), blob, UploaderOptions::from_config(config))?;
        Ok(Self::new(store, uploader))
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn uploader(&self) -> &AttachmentUploader {
        &self.uploader
    }

    /// A session for [`Archiver::ingest`]. Reuse it across events.
    #[must_use]
    pub fn open_session(&self) -> Session {
        self.store.open_session()
    }

    /// Archive one event, returning the first error encountered.
    ///
    /// Each row is committed as soon as it is written, so on error the rows
    /// committed before it remain. The caller owns the rollback of the
    /// in-flight transaction.
    pub async fn try_ingest(
        &self,
        event: &impl InboundEvent,
        session: &mut Session,
    ) -> Result<IngestReport> {
        let plain = event.message().to_plain();
        let message_id = plain
            .get("message_id")
            .and_then(text)
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingMessageId)?;
        let tx_error = |e| Error::transaction(message_id.as_str(), e);

        let message = NewMessage {
            message_id: message_id.clone(),
            session_id: plain.get("session_id").and_then(text),
            sender_id: Some(event.sender_id()),
            timestamp: plain.get("timestamp").and_then(epoch_seconds),
            raw_payload: plain.clone(),
        };
        let message_pk = session.insert_message(&message).await.map_err(tx_error)?;
        session.commit().await.map_err(tx_error)?;

        let elements = match plain.get("message") {
            Some(Value::Array(elements)) => elements.as_slice(),
            _ => &[],
        };
        let mut component_ids = Vec::with_capacity(elements.len());
        let mut uploads_scheduled = 0;
        for (order_index, element) in elements.iter().enumerate() {
            let component_type = element.get("type").and_then(text);
            let component = NewComponent {
                message_fk: message_pk,
                order_index: order_index as i64,
                component_type: component_type.clone(),
                component_data: element.clone(),
            };
            let component_id = session
                .insert_component(&component)
                .await
                .map_err(tx_error)?;
            session.commit().await.map_err(tx_error)?;
            component_ids.push(component_id);

            if component_type.as_deref().is_some_and(is_attachment_type) {
                self.uploader.schedule(UploadJob {
                    component_id,
                    fields: element.clone(),
                });
                uploads_scheduled += 1;
            }
        }

        info!(
            message_id = %message_id,
            components = component_ids.len(),
            uploads = uploads_scheduled,
            "message archived"
        );
        Ok(IngestReport {
            message_id,
            message_pk,
            component_ids,
            uploads_scheduled,
        })
    }

    /// Archive one event. Failures are logged and the in-flight transaction
    /// is rolled back; the session stays usable for the next event.
    pub async fn ingest(
        &self,
        event: &impl InboundEvent,
        session: &mut Session,
    ) -> Option<IngestReport> {
        match self.try_ingest(event, session).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(
                    message_id = %event.message().message_id,
                    error = %e,
                    "failed to archive message"
                );
                if let Err(rollback) = session.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                None
            },
        }
    }

    /// Wait for pending uploads, then close the store.
    pub async fn terminate(&self) {
        info!("shutting down archiver");
        self.uploader.drain().await;
        self.store.close().await;
        debug!("message store closed");
    }
}

/// Connect the configured S3-compatible store and make sure the bucket exists.
pub async fn connect_blob(config: &ObserverConfig) -> Result<Arc<dyn BlobStore>> {
    let blob = &config.blob;
    let mut client = S3Client::new(S3Options {
        endpoint: blob.endpoint.clone(),
        access_key: blob.access_key.clone(),
        secret_key: blob
            .secret_key
            .clone()
            .unwrap_or_else(|| Secret::new(String::new())),
        secure: blob.secure,
        region: blob.region.clone(),
    });
    client.connect()?;
    client.ensure_bucket(&blob.bucket).await?;
    Ok(Arc::new(client))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| {
            let text = value.as_str()?.trim();
            text.parse()
                .ok()
                .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        })
}
