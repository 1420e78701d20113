use std::path::Path;

use {
    anyhow::{Context, Result},
    observer_archive::connect_blob,
    observer_config::{
        ObserverConfig, Severity, default_config_template, find_config_file, validate,
    },
    observer_store::Store,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print diagnostics, then try both backends. Fails when anything is broken.
pub async fn check(config: &ObserverConfig, source: Option<&Path>, verbose: bool) -> Result<()> {
    if let Some(path) = source.map(Path::to_path_buf).or_else(find_config_file) {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let result = validate(config);
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        shown += 1;
    }
    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    eprintln!("{errors} error(s), {warnings} warning(s)");
    if errors > 0 {
        anyhow::bail!("configuration is invalid");
    }

    let mut failures = 0;

    match Store::create_engine(
        &config.database.connection_uri(),
        config.database.max_connections,
    )
    .await
    {
        Ok(store) => {
            store.close().await;
            eprintln!("  {GREEN}ok{RESET} database ({})", config.database.backend);
        },
        Err(e) => {
            failures += 1;
            eprintln!("  {BOLD}{RED}fail{RESET} database: {e}");
        },
    }

    let outcome = connect_blob(config).await;
    match outcome {
        Ok(_) => eprintln!("  {GREEN}ok{RESET} object store bucket {}", config.blob.bucket),
        Err(e) => {
            failures += 1;
            eprintln!("  {BOLD}{RED}fail{RESET} object store: {e}");
        },
    }

    if failures > 0 {
        anyhow::bail!("{failures} backend(s) unreachable");
    }
    Ok(())
}

/// Write the documented default config to `path`.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, default_config_template())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/observer.toml");

        init_config(&path, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[database]"));

        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn written_template_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observer.toml");
        init_config(&path, false).unwrap();

        let config = observer_config::load_config(&path).unwrap();
        assert_eq!(config.blob.bucket, "observer");
    }
}
