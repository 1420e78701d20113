use std::path::Path;

use {
    sqlx::{AnyPool, any::AnyPoolOptions},
    tracing::{debug, info},
};

use crate::{
    Dialect, Error, Result, Session,
    models::{ComponentRecord, ComponentRow, FileRecord, FileRow, MessageRecord, MessageRow},
    schema,
};

/// Handle to the relational store: a connection pool plus its dialect.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Clone)]
pub struct Store {
    pool: AnyPool,
    dialect: Dialect,
}

impl Store {
    /// Connect to the backend named by `uri`.
    ///
    /// For SQLite the parent directory of the database file is created first.
    pub async fn create_engine(uri: &str, max_connections: u32) -> Result<Self> {
        let dialect = Dialect::from_uri(uri)?;
        if dialect == Dialect::Sqlite {
            ensure_sqlite_dir(uri)?;
        }

        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(uri)
            .await
            .map_err(|e| Error::connection(format!("failed to connect to {dialect}"), e))?;

        info!(%dialect, "database connected");
        Ok(Self { pool, dialect })
    }

    /// Create all tables and indexes that do not exist yet.
    pub async fn initialize_schema(&self) -> Result<()> {
        for statement in schema::statements(self.dialect) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(dialect = %self.dialect, "schema initialized");
        Ok(())
    }

    /// Open a new unit-of-work session on the shared pool.
    #[must_use]
    pub fn open_session(&self) -> Session {
        Session::new(self.pool.clone(), self.dialect)
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Look up a message by its external identifier.
    pub async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>> {
        let sql = self.dialect.sql(&format!(
            "SELECT id, message_id, session_id, sender_id, timestamp, {} AS raw_payload
             FROM messages WHERE message_id = ?",
            self.dialect.payload_column()
        ));
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Components of a message in their original order.
    pub async fn components(&self, message_fk: i64) -> Result<Vec<ComponentRecord>> {
        let sql = self.dialect.sql(
            "SELECT id, message_fk, order_index, component_type, component_data
             FROM message_components WHERE message_fk = ? ORDER BY order_index",
        );
        let rows = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(message_fk)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The upload outcome for a component, if its upload has completed.
    pub async fn file_for_component(&self, component_fk: i64) -> Result<Option<FileRecord>> {
        let sql = self.dialect.sql(
            "SELECT id, component_fk, file_name, storage_path, upload_timestamp
             FROM files WHERE component_fk = ?",
        );
        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(component_fk)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Delete a message together with its components and file rows.
    ///
    /// Returns `false` when no message had that identifier.
    pub async fn delete_message(&self, message_id: &str) -> Result<bool> {
        let sql = self.dialect.sql("DELETE FROM messages WHERE message_id = ?");
        let result = sqlx::query(&sql)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Create the directory holding a SQLite database file.
fn ensure_sqlite_dir(uri: &str) -> Result<()> {
    let rest = uri
        .strip_prefix("sqlite://")
        .or_else(|| uri.strip_prefix("sqlite:"))
        .unwrap_or(uri);
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
