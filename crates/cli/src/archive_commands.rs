use std::path::Path;

use {
    anyhow::{Context, Result},
    observer_archive::{Archiver, JsonLinesSource},
    observer_config::ObserverConfig,
    tokio::io::AsyncRead,
    tracing::{error, info},
};

/// Archive events until the input ends or Ctrl-C, then drain uploads.
pub async fn run(config: &ObserverConfig, input: Option<&Path>) -> Result<()> {
    let archiver = Archiver::initialize(config)
        .await
        .context("failed to initialize archiver")?;

    let reader: Box<dyn AsyncRead + Unpin + Send> = match input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut source = JsonLinesSource::new(reader);
    let mut session = archiver.open_session();

    info!(
        source = input.map_or_else(|| "stdin".to_string(), |p| p.display().to_string()),
        "archiving events"
    );

    let (mut archived, mut failed) = (0_u64, 0_u64);
    loop {
        tokio::select! {
            next = source.next_event() => match next {
                Ok(Some(event)) => {
                    if archiver.ingest(&event, &mut session).await.is_some() {
                        archived += 1;
                    } else {
                        failed += 1;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "failed to read events");
                    break;
                },
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, finishing pending uploads");
                break;
            },
        }
    }

    archiver.terminate().await;
    info!(archived, failed, lines = source.line_number(), "archiver stopped");
    Ok(())
}
