//! Backend dialects and the payload column encoding strategy.
//!
//! The dialect is chosen once from the connection URI and never inferred from
//! stored values. Every statement is written with `?` placeholders and
//! rewritten here for backends that number them.

use std::fmt;

use crate::{Error, Result};

/// SQL dialect of the connected backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How `messages.raw_payload` is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// Native JSON column (`JSONB` on Postgres, `JSON` on MySQL).
    Structured,
    /// Text column holding a JSON document.
    Text,
}

/// How the surrogate key of a freshly inserted row is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdStrategy {
    Returning,
    LastInsertId,
}

impl Dialect {
    /// Select the dialect from a connection URI scheme.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let scheme = uri
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .unwrap_or_default()
            .to_ascii_lowercase();
        // Driver suffixes such as `postgresql+psycopg2` name the same backend.
        let family = scheme.split('+').next().unwrap_or_default();

        match family {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(Error::unsupported_backend(scheme)),
        }
    }

    #[must_use]
    pub fn payload_encoding(self) -> PayloadEncoding {
        match self {
            Self::Postgres | Self::MySql => PayloadEncoding::Structured,
            Self::Sqlite => PayloadEncoding::Text,
        }
    }

    pub(crate) fn id_strategy(self) -> IdStrategy {
        match self {
            Self::Postgres | Self::Sqlite => IdStrategy::Returning,
            Self::MySql => IdStrategy::LastInsertId,
        }
    }

    /// Placeholder expression that stores a bound JSON string in the payload column.
    pub(crate) fn payload_value(self) -> &'static str {
        match self {
            Self::Postgres => "CAST(? AS JSONB)",
            Self::MySql => "CAST(? AS JSON)",
            Self::Sqlite => "?",
        }
    }

    /// Column expression that reads the payload back as JSON text.
    pub(crate) fn payload_column(self) -> &'static str {
        match self {
            Self::Postgres => "CAST(raw_payload AS TEXT)",
            Self::MySql => "CAST(raw_payload AS CHAR)",
            Self::Sqlite => "raw_payload",
        }
    }

    /// Rewrite `?` placeholders into the backend's native style.
    #[must_use]
    pub fn sql(self, statement: &str) -> String {
        match self {
            Self::MySql | Self::Sqlite => statement.to_string(),
            Self::Postgres => {
                let mut out = String::with_capacity(statement.len() + 8);
                let mut n = 0;
                for ch in statement.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_dialect_from_scheme() {
        assert_eq!(
            Dialect::from_uri("postgres://u:p@h:5432/db").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_uri("postgresql+psycopg2://u@h/db").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(
            Dialect::from_uri("mysql://root@localhost/db").unwrap(),
            Dialect::MySql
        );
        assert_eq!(
            Dialect::from_uri("sqlite://data/messages.db?mode=rwc").unwrap(),
            Dialect::Sqlite
        );
        assert_eq!(Dialect::from_uri("sqlite::memory:").unwrap(), Dialect::Sqlite);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = Dialect::from_uri("oracle://x/y").unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend { scheme } if scheme == "oracle"));
        assert!(Dialect::from_uri("no-scheme-at-all").is_err());
    }

    #[test]
    fn encoding_follows_backend() {
        assert_eq!(
            Dialect::Postgres.payload_encoding(),
            PayloadEncoding::Structured
        );
        assert_eq!(Dialect::MySql.payload_encoding(), PayloadEncoding::Structured);
        assert_eq!(Dialect::Sqlite.payload_encoding(), PayloadEncoding::Text);
    }

    #[test]
    fn numbers_placeholders_for_postgres() {
        let sql = "INSERT INTO t (a, b, c) VALUES (?, ?, CAST(? AS JSONB))";
        assert_eq!(
            Dialect::Postgres.sql(sql),
            "INSERT INTO t (a, b, c) VALUES ($1, $2, CAST($3 AS JSONB))"
        );
        assert_eq!(Dialect::Sqlite.sql(sql), sql);
    }
}
