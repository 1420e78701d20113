use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    schema::{DatabaseBackend, ObserverConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "observer.toml",
    "observer.yaml",
    "observer.yml",
    "observer.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ObserverConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./observer.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/observer/observer.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ObserverConfig::default()` if no config file is found. A file
/// that is found but cannot be loaded is an error.
pub fn discover_and_load() -> anyhow::Result<ObserverConfig> {
    load_discovered(find_config_file())
}

fn load_discovered(found: Option<PathBuf>) -> anyhow::Result<ObserverConfig> {
    let Some(path) = found else {
        debug!("no config file found, using defaults");
        return Ok(ObserverConfig::default());
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/observer/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "observer").map(|d| d.config_dir().to_path_buf())
}

/// Apply `OBSERVER_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: ObserverConfig) -> ObserverConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: ObserverConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ObserverConfig {
    if let Some(url) = lookup("OBSERVER_DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(backend) = lookup("OBSERVER_DB_BACKEND") {
        match backend.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => config.database.backend = DatabaseBackend::Postgresql,
            "mysql" | "mariadb" => config.database.backend = DatabaseBackend::Mysql,
            "sqlite" => config.database.backend = DatabaseBackend::Sqlite,
            other => warn!(backend = other, "ignoring unknown OBSERVER_DB_BACKEND"),
        }
    }
    if let Some(password) = lookup("OBSERVER_DB_PASSWORD") {
        config.database.password = Some(Secret::new(password));
    }
    if let Some(endpoint) = lookup("OBSERVER_BLOB_ENDPOINT") {
        config.blob.endpoint = endpoint;
    }
    if let Some(access_key) = lookup("OBSERVER_BLOB_ACCESS_KEY") {
        config.blob.access_key = access_key;
    }
    if let Some(secret_key) = lookup("OBSERVER_BLOB_SECRET_KEY") {
        config.blob.secret_key = Some(Secret::new(secret_key));
    }
    if let Some(bucket) = lookup("OBSERVER_BLOB_BUCKET") {
        config.blob.bucket = bucket;
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ObserverConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn discovered_file_that_does_not_parse_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("observer.toml");
        std::fs::write(&path, "[database\nbackend = ").unwrap();

        let err = load_discovered(Some(path)).unwrap_err();
        assert!(err.to_string().contains("observer.toml"));
    }

    #[test]
    fn nothing_discovered_means_defaults() {
        let cfg = load_discovered(None).unwrap();
        assert_eq!(cfg.blob.bucket, ObserverConfig::default().blob.bucket);
    }

    #[test]
    fn loads_toml_with_env_placeholders() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("observer.toml");
        std::fs::write(
            &path,
            r#"
[database]
backend = "postgresql"
host = "db"
name = "chat"

[blob]
endpoint = "https://minio.example.com"
bucket = "${OBSERVER_TEST_UNSET_BUCKET:-attachments}"

[uploads]
max_concurrent = 8
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.database.backend, DatabaseBackend::Postgresql);
        assert_eq!(cfg.blob.bucket, "attachments");
        assert_eq!(cfg.uploads.max_concurrent, 8);
        assert_eq!(cfg.uploads.fetch_timeout_secs, 30);
    }

    #[test]
    fn loads_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("observer.yaml");
        std::fs::write(
            &path,
            "database:\n  backend: mysql\n  user: root\nblob:\n  secure: true\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.database.backend, DatabaseBackend::Mysql);
        assert!(cfg.blob.secure);
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("observer.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let lookup = |name: &str| match name {
            "OBSERVER_DB_BACKEND" => Some("Postgres".to_string()),
            "OBSERVER_DB_PASSWORD" => Some("s3cret".to_string()),
            "OBSERVER_BLOB_BUCKET" => Some("chat-media".to_string()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(ObserverConfig::default(), lookup);
        assert_eq!(cfg.database.backend, DatabaseBackend::Postgresql);
        assert_eq!(
            cfg.database.password.as_ref().unwrap().expose_secret(),
            "s3cret"
        );
        assert_eq!(cfg.blob.bucket, "chat-media");
    }
}
