//! Unit-of-work sessions over the shared pool.
//!
//! A session holds at most one open transaction. Inserts start it lazily and
//! [`Session::commit`] ends it, so callers decide where each transaction
//! boundary falls. A session must not be shared between concurrent tasks;
//! open one per unit of work.

use {
    serde_json::Value,
    sqlx::{Any, AnyPool, Row, Transaction, any::AnyArguments, query::Query},
};

use crate::{
    Dialect, Error, Result,
    dialect::IdStrategy,
    models::{NewComponent, NewFile, NewMessage},
};

/// A bound statement parameter.
enum Param {
    Int(i64),
    OptInt(Option<i64>),
    Text(String),
    OptText(Option<String>),
}

impl Param {
    fn bind<'q>(self, query: Query<'q, Any, AnyArguments<'q>>) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            Self::Int(v) => query.bind(v),
            Self::OptInt(v) => query.bind(v),
            Self::Text(v) => query.bind(v),
            Self::OptText(v) => query.bind(v),
        }
    }
}

pub struct Session {
    pool: AnyPool,
    dialect: Dialect,
    tx: Option<Transaction<'static, Any>>,
}

impl Session {
    pub(crate) fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            tx: None,
        }
    }

    /// Whether uncommitted work is pending.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    async fn transaction(&mut self) -> Result<&mut Transaction<'static, Any>> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
        }
        self.tx
            .as_mut()
            .ok_or_else(|| Error::message("transaction is not open"))
    }

    async fn insert_returning_id(&mut self, statement: &str, params: Vec<Param>) -> Result<i64> {
        let dialect = self.dialect;
        let statement = match dialect.id_strategy() {
            IdStrategy::Returning => format!("{statement} RETURNING id"),
            IdStrategy::LastInsertId => statement.to_string(),
        };
        let sql = dialect.sql(&statement);
        let tx = self.transaction().await?;
        let query = params
            .into_iter()
            .fold(sqlx::query(&sql), |query, param| param.bind(query));

        match dialect.id_strategy() {
            IdStrategy::Returning => {
                let row = query.fetch_one(&mut **tx).await?;
                Ok(row.try_get::<i64, _>(0)?)
            },
            IdStrategy::LastInsertId => query
                .execute(&mut **tx)
                .await?
                .last_insert_id()
                .ok_or_else(|| Error::message("backend did not report the inserted row id")),
        }
    }

    /// Insert a message row and return its surrogate key.
    pub async fn insert_message(&mut self, message: &NewMessage) -> Result<i64> {
        let statement = format!(
            "INSERT INTO messages (message_id, session_id, sender_id, timestamp, raw_payload)
             VALUES (?, ?, ?, ?, {})",
            self.dialect.payload_value()
        );
        let params = vec![
            Param::Text(message.message_id.clone()),
            Param::OptText(message.session_id.clone()),
            Param::OptText(message.sender_id.clone()),
            Param::OptInt(message.timestamp),
            Param::Text(encode_json(&message.raw_payload)?),
        ];
        self.insert_returning_id(&statement, params).await
    }

    /// Insert a component row and return its surrogate key.
    pub async fn insert_component(&mut self, component: &NewComponent) -> Result<i64> {
        let params = vec![
            Param::Int(component.message_fk),
            Param::Int(component.order_index),
            Param::OptText(component.component_type.clone()),
            Param::Text(encode_json(&component.component_data)?),
        ];
        self.insert_returning_id(
            "INSERT INTO message_components (message_fk, order_index, component_type, component_data)
             VALUES (?, ?, ?, ?)",
            params,
        )
        .await
    }

    /// Insert an upload outcome row and return its surrogate key.
    pub async fn insert_file(&mut self, file: &NewFile) -> Result<i64> {
        let params = vec![
            Param::Int(file.component_fk),
            Param::Text(file.file_name.clone()),
            Param::Text(file.storage_path.clone()),
            Param::Int(file.upload_timestamp),
        ];
        self.insert_returning_id(
            "INSERT INTO files (component_fk, file_name, storage_path, upload_timestamp)
             VALUES (?, ?, ?, ?)",
            params,
        )
        .await
    }

    /// Commit pending work. A no-op when nothing is pending.
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Discard pending work. Already committed work is untouched.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

fn encode_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
