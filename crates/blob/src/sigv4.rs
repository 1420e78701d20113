//! AWS Signature Version 4 for S3-compatible endpoints.
//!
//! Only the headers this client sends are signed: `host`,
//! `x-amz-content-sha256` and `x-amz-date`.

use {
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::{Digest, Sha256},
    url::Url,
};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Credentials and scope used to sign a request.
pub struct Credentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

/// Lowercase hex SHA-256 of a request body.
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key for one day, region and service.
pub fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Value of the `host` header for a URL, including a non-default port.
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_request(method: &str, url: &Url, content_sha256: &str, amz_date: &str) -> String {
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    format!(
        "{method}\n{path}\n{query}\nhost:{host}\nx-amz-content-sha256:{content_sha256}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{content_sha256}",
        query = canonical_query(url),
        host = host_header(url),
    )
}

/// Sign a request whose path is already percent-encoded.
pub fn sign(
    method: &str,
    url: &Url,
    content_sha256: &str,
    credentials: &Credentials<'_>,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!(
        "{date}/{}/{}/aws4_request",
        credentials.region, credentials.service
    );

    let request = canonical_request(method, url, content_sha256, &amz_date);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        payload_hash(request.as_bytes())
    );
    let key = signing_key(
        credentials.secret_key,
        &date,
        credentials.region,
        credentials.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            credentials.access_key
        ),
        amz_date,
        content_sha256: content_sha256.to_string(),
    }
}

/// Percent-encode an object key, keeping `/` as the segment separator.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
