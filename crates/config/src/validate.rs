//! Semantic validation of a loaded configuration.
//!
//! Parsing already rejects type errors; this pass reports settings that would
//! make the archiver refuse to start, plus a few security hints.

use {secrecy::ExposeSecret, url::Url};

use crate::schema::{DatabaseBackend, ObserverConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing", "invalid", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "blob.bucket"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a parsed configuration.
#[must_use]
pub fn validate(config: &ObserverConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let db = &config.database;

    let has_url = db.url.as_deref().is_some_and(|u| !u.trim().is_empty());
    if !has_url {
        match db.backend {
            DatabaseBackend::Sqlite => {
                if db.sqlite_path.trim().is_empty() {
                    result.push(
                        Severity::Error,
                        "missing",
                        "database.sqlite_path",
                        "sqlite backend needs a database file path",
                    );
                }
            },
            DatabaseBackend::Postgresql | DatabaseBackend::Mysql => {
                if db.host.trim().is_empty() {
                    result.push(
                        Severity::Error,
                        "missing",
                        "database.host",
                        format!("{} backend needs a host", db.backend),
                    );
                }
                if db.name.trim().is_empty() {
                    result.push(
                        Severity::Error,
                        "missing",
                        "database.name",
                        format!("{} backend needs a database name", db.backend),
                    );
                }
                if db.user.is_none() {
                    result.push(
                        Severity::Warning,
                        "missing",
                        "database.user",
                        "no database user configured",
                    );
                }
            },
        }
    }
    if db.max_connections == 0 {
        result.push(
            Severity::Error,
            "invalid",
            "database.max_connections",
            "must be at least 1",
        );
    }

    let blob = &config.blob;
    if blob.endpoint.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "blob.endpoint",
            "object store endpoint is required",
        );
    } else if Url::parse(&format!("http://{}", strip_scheme(&blob.endpoint))).is_err()
        || strip_scheme(&blob.endpoint).contains('/')
    {
        result.push(
            Severity::Error,
            "invalid",
            "blob.endpoint",
            format!("expected host[:port], got {}", blob.endpoint),
        );
    }
    if blob.bucket.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "blob.bucket",
            "bucket name is required",
        );
    }
    if blob.access_key.is_empty()
        || blob
            .secret_key
            .as_ref()
            .is_none_or(|s| s.expose_secret().is_empty())
    {
        result.push(
            Severity::Warning,
            "missing",
            "blob.secret_key",
            "object store credentials are incomplete; requests will be rejected by most servers",
        );
    }
    if !blob.secure {
        result.push(
            Severity::Info,
            "security",
            "blob.secure",
            "attachments are uploaded over plain HTTP",
        );
    }

    let uploads = &config.uploads;
    if uploads.max_concurrent == 0 {
        result.push(
            Severity::Error,
            "invalid",
            "uploads.max_concurrent",
            "must be at least 1",
        );
    }
    if uploads.fetch_timeout_secs == 0 || uploads.upload_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "invalid",
            "uploads",
            "timeouts must be at least one second",
        );
    }

    result
}

fn strip_scheme(endpoint: &str) -> &str {
    let endpoint = endpoint.trim();
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
        .trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn complete() -> ObserverConfig {
        let mut cfg = ObserverConfig::default();
        cfg.blob.access_key = "minio".into();
        cfg.blob.secret_key = Some(Secret::new("minio123".into()));
        cfg.blob.secure = true;
        cfg
    }

    #[test]
    fn default_sqlite_config_is_valid() {
        let result = validate(&complete());
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert_eq!(result.count(Severity::Warning), 0);
    }

    #[test]
    fn empty_bucket_is_an_error() {
        let mut cfg = complete();
        cfg.blob.bucket = String::new();
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert!(result.diagnostics.iter().any(|d| d.path == "blob.bucket"));
    }

    #[test]
    fn server_backend_needs_host() {
        let mut cfg = complete();
        cfg.database.backend = DatabaseBackend::Postgresql;
        cfg.database.host = String::new();
        let result = validate(&cfg);
        assert!(result.diagnostics.iter().any(|d| d.path == "database.host"));
    }

    #[test]
    fn missing_credentials_warn() {
        let mut cfg = complete();
        cfg.blob.secret_key = None;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn endpoint_with_path_is_invalid() {
        let mut cfg = complete();
        cfg.blob.endpoint = "http://minio:9000/archive".into();
        let result = validate(&cfg);
        assert!(result.diagnostics.iter().any(|d| d.path == "blob.endpoint"));
    }

    #[test]
    fn plain_http_is_reported_even_with_https_scheme() {
        let mut cfg = complete();
        cfg.blob.endpoint = "https://s3.example.com".into();
        cfg.blob.secure = false;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Info), 1);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut cfg = complete();
        cfg.uploads.max_concurrent = 0;
        assert!(validate(&cfg).has_errors());
    }
}
