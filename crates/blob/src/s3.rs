use {
    async_trait::async_trait,
    bytes::Bytes,
    chrono::Utc,
    reqwest::{
        Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
    url::Url,
};

use crate::{
    BlobStore, Error, OCTET_STREAM, Result, check_object_name,
    sigv4::{self, Credentials},
};

const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3Options {
    /// `host[:port]`. A leading `http://` or `https://` is ignored; `secure` decides.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: Secret<String>,
    pub secure: bool,
    pub region: String,
}

struct Connected {
    http: reqwest::Client,
    origin: String,
}

/// Path-style S3 client. Call [`S3Client::connect`] before use.
pub struct S3Client {
    options: S3Options,
    connected: Option<Connected>,
}

impl S3Client {
    #[must_use]
    pub fn new(options: S3Options) -> Self {
        Self {
            options,
            connected: None,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Validate the endpoint and build the HTTP client.
    pub fn connect(&mut self) -> Result<()> {
        let host = strip_scheme(&self.options.endpoint);
        if host.is_empty() {
            return Err(Error::connection("endpoint is empty"));
        }
        if host.contains('/') {
            return Err(Error::connection(format!(
                "endpoint must be host[:port], got {:?}",
                self.options.endpoint
            )));
        }

        let scheme = if self.options.secure {
            "https"
        } else {
            "http"
        };
        let origin = format!("{scheme}://{host}");
        let parsed = Url::parse(&origin)
            .map_err(|e| Error::connection(format!("invalid endpoint {origin}: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(Error::connection(format!("endpoint {origin} has no host")));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::connection(format!("failed to build http client: {e}")))?;

        info!(endpoint = %origin, region = %self.options.region, "object store client ready");
        self.connected = Some(Connected { http, origin });
        Ok(())
    }

    fn connection(&self) -> Result<&Connected> {
        self.connected.as_ref().ok_or(Error::NotInitialized)
    }

    fn url(&self, origin: &str, path: &str) -> Result<Url> {
        Url::parse(&format!("{origin}/{path}"))
            .map_err(|e| Error::invalid_input(format!("invalid object path {path:?}: {e}")))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Bytes,
        mut headers: HeaderMap,
    ) -> Result<reqwest::Response> {
        let conn = self.connection()?;
        let content_sha256 = sigv4::payload_hash(&body);
        let signed = sigv4::sign(
            method.as_str(),
            &url,
            &content_sha256,
            &Credentials {
                access_key: &self.options.access_key,
                secret_key: self.options.secret_key.expose_secret(),
                region: &self.options.region,
                service: "s3",
            },
            Utc::now(),
        );

        headers.insert(AUTHORIZATION, header_value(&signed.authorization)?);
        headers.insert("x-amz-date", header_value(&signed.amz_date)?);
        headers.insert("x-amz-content-sha256", header_value(&signed.content_sha256)?);

        let context = format!("{method} {url}");
        conn.http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::external(context, e))
    }

    async fn create_bucket(&self, origin: &str, bucket: &str) -> Result<()> {
        let body = if self.options.region.is_empty() || self.options.region == DEFAULT_REGION {
            Bytes::new()
        } else {
            Bytes::from(format!(
                "<CreateBucketConfiguration><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                self.options.region
            ))
        };
        let url = self.url(origin, &sigv4::encode_key(bucket))?;
        let response = self.send(Method::PUT, url, body, HeaderMap::new()).await?;
        match response.status() {
            status if status.is_success() => {
                info!(bucket, "bucket created");
                Ok(())
            },
            // Created concurrently by someone else.
            StatusCode::CONFLICT => Ok(()),
            status => Err(rejection(format!("create bucket {bucket}"), status, response).await),
        }
    }
}

#[async_trait]
impl BlobStore for S3Client {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let origin = self.connection()?.origin.clone();
        let url = self.url(&origin, &sigv4::encode_key(bucket))?;
        let response = self
            .send(Method::HEAD, url, Bytes::new(), HeaderMap::new())
            .await?;
        match response.status() {
            status if status.is_success() => {
                debug!(bucket, "bucket exists");
                Ok(())
            },
            StatusCode::NOT_FOUND => self.create_bucket(&origin, bucket).await,
            status => Err(rejection(format!("check bucket {bucket}"), status, response).await),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        data: Bytes,
        length: u64,
    ) -> Result<()> {
        let origin = self.connection()?.origin.clone();
        check_object_name(object_name)?;
        if data.len() as u64 != length {
            return Err(Error::invalid_input(format!(
                "declared length {length} does not match {} bytes of data",
                data.len()
            )));
        }

        let path = format!(
            "{}/{}",
            sigv4::encode_key(bucket),
            sigv4::encode_key(object_name)
        );
        let url = self.url(&origin, &path)?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

        let response = self.send(Method::PUT, url, data, headers).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejection(format!("put {bucket}/{object_name}"), status, response).await);
        }
        debug!(bucket, object = object_name, length, "object stored");
        Ok(())
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    let endpoint = endpoint.trim();
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    host.trim_end_matches('/')
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_input(format!("invalid header value: {e}")))
}

async fn rejection(context: String, status: StatusCode, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    Error::storage(context, message)
}
