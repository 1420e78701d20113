//! Configuration loading, validation and env substitution.
//!
//! Config files: `observer.toml`, `observer.yaml` or `observer.json`
//! Searched in `./` then `~/.config/observer/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{BlobConfig, DatabaseBackend, DatabaseConfig, ObserverConfig, UploadsConfig},
    template::default_config_template,
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
