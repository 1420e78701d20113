//! Background transfer of attachments into the object store.
//!
//! Each scheduled job downloads the attachment, puts it into the bucket and
//! records a `files` row on its own store session. Jobs run on a
//! [`TaskTracker`] so shutdown can wait for them; a semaphore caps how many
//! transfer at once. Failures are logged and leave no `files` row.

use std::{future::Future, sync::Arc, time::Duration};

use {
    bytes::Bytes,
    chrono::Utc,
    observer_blob::BlobStore,
    observer_config::ObserverConfig,
    observer_store::{NewFile, Store},
    serde_json::Value,
    tokio::sync::Semaphore,
    tokio_util::task::TaskTracker,
    tracing::{debug, error, info, warn},
};

use crate::{Error, Result};

/// Tuning for the upload workers.
#[derive(Debug, Clone)]
pub struct UploaderOptions {
    pub bucket: String,
    pub max_concurrent: usize,
    pub fetch_timeout: Duration,
    pub upload_timeout: Duration,
}

impl UploaderOptions {
    #[must_use]
    pub fn from_config(config: &ObserverConfig) -> Self {
        Self {
            bucket: config.blob.bucket.clone(),
            max_concurrent: config.uploads.max_concurrent,
            fetch_timeout: Duration::from_secs(config.uploads.fetch_timeout_secs),
            upload_timeout: Duration::from_secs(config.uploads.upload_timeout_secs),
        }
    }
}

/// One attachment component waiting to be transferred.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub component_id: i64,
    /// The serialized component; `url` and `file` are read from it.
    pub fields: Value,
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_id: i64,
    pub component_id: i64,
    pub file_name: String,
    pub storage_path: String,
}

struct Inner {
    http: reqwest::Client,
    blob: Arc<dyn BlobStore>,
    store: Store,
    bucket: String,
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    fetch_timeout: Duration,
    upload_timeout: Duration,
}

#[derive(Clone)]
pub struct AttachmentUploader {
    inner: Arc<Inner>,
}

impl AttachmentUploader {
    pub fn new(store: Store, blob: Arc<dyn BlobStore>, options: UploaderOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::http("client", e))?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                blob,
                store,
                bucket: options.bucket,
                tracker: TaskTracker::new(),
                permits: Arc::new(Semaphore::new(options.max_concurrent.max(1))),
                fetch_timeout: options.fetch_timeout,
                upload_timeout: options.upload_timeout,
            }),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// Queue a job without waiting for it. The outcome is only logged.
    pub fn schedule(&self, job: UploadJob) {
        let this = self.clone();
        let component_id = job.component_id;
        debug!(component_id, "attachment upload scheduled");
        self.inner.tracker.spawn(async move {
            let Ok(_permit) = this.inner.permits.clone().acquire_owned().await else {
                return;
            };
            match this.upload(job).await {
                Ok(_) => {},
                Err(e @ Error::MissingField { .. }) => {
                    warn!(component_id, error = %e, "attachment skipped");
                },
                Err(e) => {
                    error!(component_id, error = %e, "attachment upload failed");
                },
            }
        });
    }

    /// Transfer one attachment and record where it was stored.
    pub async fn upload(&self, job: UploadJob) -> Result<StoredFile> {
        let inner = &self.inner;
        let url = required_text(&job, "url")?;
        let file_name = required_text(&job, "file")?;
        observer_blob::check_object_name(file_name)?;

        let data = with_timeout("download", inner.fetch_timeout, self.fetch(url)).await??;
        let length = data.len() as u64;
        with_timeout(
            "upload",
            inner.upload_timeout,
            inner.blob.upload(&inner.bucket, file_name, data, length),
        )
        .await??;
        info!(component_id = job.component_id, file_name, length, "attachment stored");

        let storage_path = format!("/{}/{file_name}", inner.bucket);
        let file_id = self
            .record(job.component_id, file_name, &storage_path)
            .await?;
        info!(component_id = job.component_id, file_id, "file record saved");

        Ok(StoredFile {
            file_id,
            component_id: job.component_id,
            file_name: file_name.to_string(),
            storage_path,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadFailure {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.bytes().await.map_err(|e| Error::http(url, e))
    }

    async fn record(&self, component_id: i64, file_name: &str, storage_path: &str) -> Result<i64> {
        let mut session = self.inner.store.open_session();
        let row = NewFile {
            component_fk: component_id,
            file_name: file_name.to_string(),
            storage_path: storage_path.to_string(),
            upload_timestamp: Utc::now().timestamp(),
        };
        let file_id = match session.insert_file(&row).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(rollback) = session.rollback().await {
                    warn!(component_id, error = %rollback, "rollback failed");
                }
                return Err(e.into());
            },
        };
        session.commit().await?;
        Ok(file_id)
    }

    /// Jobs scheduled but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Stop accepting work and wait for every scheduled job.
    pub async fn drain(&self) {
        let pending = self.pending();
        if pending > 0 {
            info!(pending, "waiting for attachment uploads");
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Wait for every job scheduled so far, then keep accepting work.
    pub async fn wait_idle(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }
}

fn required_text<'a>(job: &'a UploadJob, field: &'static str) -> Result<&'a str> {
    job.fields
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField {
            component_id: job.component_id,
            field,
        })
}

async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    future: impl Future<Output = T>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Error::Timeout {
            operation,
            seconds: limit.as_secs_f64(),
        })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        observer_blob::MemoryBlobStore,
        observer_store::{NewComponent, NewMessage},
        serde_json::json,
        tokio::net::TcpListener,
    };

    struct Fixture {
        _tmp: tempfile::TempDir,
        store: Store,
        blob: Arc<MemoryBlobStore>,
        uploader: AttachmentUploader,
        component_id: i64,
    }

    async fn fixture(fetch_timeout: Duration) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let uri = format!("sqlite://{}?mode=rwc", tmp.path().join("archive.db").display());
        let store = Store::create_engine(&uri, 2).await.unwrap();
        store.initialize_schema().await.unwrap();

        let mut session = store.open_session();
        let message_fk = session
            .insert_message(&NewMessage {
                message_id: "m1".into(),
                session_id: None,
                sender_id: None,
                timestamp: None,
                raw_payload: json!({}),
            })
            .await
            .unwrap();
        let component_id = session
            .insert_component(&NewComponent {
                message_fk,
                order_index: 0,
                component_type: Some("Image".into()),
                component_data: json!({"type": "Image"}),
            })
            .await
            .unwrap();
        session.commit().await.unwrap();

        let blob = Arc::new(MemoryBlobStore::new());
        blob.ensure_bucket("bucket").await.unwrap();
        let uploader = AttachmentUploader::new(store.clone(), blob.clone(), UploaderOptions {
            bucket: "bucket".into(),
            max_concurrent: 2,
            fetch_timeout,
            upload_timeout: Duration::from_secs(5),
        })
        .unwrap();

        Fixture {
            _tmp: tmp,
            store,
            blob,
            uploader,
            component_id,
        }
    }

    fn job(component_id: i64, url: &str, file: &str) -> UploadJob {
        UploadJob {
            component_id,
            fields: json!({"type": "Image", "url": url, "file": file}),
        }
    }

    #[tokio::test]
    async fn stores_object_and_file_row() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/y.png")
            .with_status(200)
            .with_body("png-bytes")
            .create_async()
            .await;
        let fx = fixture(Duration::from_secs(5)).await;

        let url = format!("{}/y.png", server.url());
        let stored = fx.uploader.upload(job(fx.component_id, &url, "y.png")).await.unwrap();

        assert_eq!(stored.storage_path, "/bucket/y.png");
        assert_eq!(fx.blob.object("bucket", "y.png").unwrap(), "png-bytes");
        let file = fx.store.file_for_component(fx.component_id).await.unwrap().unwrap();
        assert_eq!(file.id, stored.file_id);
        assert_eq!(file.file_name.as_deref(), Some("y.png"));
        assert!(file.upload_timestamp.unwrap() > 0);
    }

    #[tokio::test]
    async fn missing_url_or_name_is_rejected() {
        let fx = fixture(Duration::from_secs(5)).await;
        let no_url = UploadJob {
            component_id: fx.component_id,
            fields: json!({"type": "Image", "file": "y.png"}),
        };
        let err = fx.uploader.upload(no_url).await.unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "url", .. }));

        let err = fx
            .uploader
            .upload(job(fx.component_id, "http://x/y.png", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { field: "file", .. }));
        assert!(fx.store.file_for_component(fx.component_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_name_outside_the_bucket_is_refused() {
        let mut server = mockito::Server::new_async().await;
        let download = server
            .mock("GET", "/x.png")
            .with_status(200)
            .with_body("x")
            .expect(0)
            .create_async()
            .await;
        let fx = fixture(Duration::from_secs(5)).await;

        let url = format!("{}/x.png", server.url());
        let err = fx
            .uploader
            .upload(job(fx.component_id, &url, "../other/x.png"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Blob(observer_blob::Error::InvalidInput { .. })
        ));
        download.assert_async().await;
        assert_eq!(fx.blob.object_count(), 0);
        assert!(fx.store.file_for_component(fx.component_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_download_leaves_no_trace() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;
        let fx = fixture(Duration::from_secs(5)).await;

        let url = format!("{}/gone.png", server.url());
        let err = fx
            .uploader
            .upload(job(fx.component_id, &url, "gone.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DownloadFailure { status: 404, .. }));
        assert_eq!(fx.blob.object_count(), 0);
        assert!(fx.store.file_for_component(fx.component_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stalled_download_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });
        let fx = fixture(Duration::from_millis(200)).await;

        let url = format!("http://{addr}/slow.png");
        let err = fx
            .uploader
            .upload(job(fx.component_id, &url, "slow.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { operation: "download", .. }));
        hold.abort();
    }

    #[tokio::test]
    async fn scheduled_jobs_are_tracked_until_drained() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/y.png")
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;
        let fx = fixture(Duration::from_secs(5)).await;

        fx.uploader
            .schedule(job(fx.component_id, &format!("{}/y.png", server.url()), "y.png"));
        fx.uploader.wait_idle().await;
        assert_eq!(fx.uploader.pending(), 0);
        assert!(fx.store.file_for_component(fx.component_id).await.unwrap().is_some());

        // Still accepting work after wait_idle; a failing job only logs.
        fx.uploader.schedule(job(fx.component_id, "", "y.png"));
        fx.uploader.drain().await;
        assert_eq!(fx.uploader.pending(), 0);
    }
}
