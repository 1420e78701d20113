//! Table definitions for each dialect.
//!
//! messages 1──* message_components 1──0..1 files, all `ON DELETE CASCADE`.
//! Statements are idempotent and executed one at a time.

use crate::Dialect;

const SQLITE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id  TEXT    NOT NULL UNIQUE,
        session_id  TEXT,
        sender_id   TEXT,
        timestamp   INTEGER,
        raw_payload TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages (timestamp)",
    "CREATE TABLE IF NOT EXISTS message_components (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        message_fk     INTEGER NOT NULL REFERENCES messages (id) ON DELETE CASCADE,
        order_index    INTEGER NOT NULL,
        component_type TEXT,
        component_data TEXT,
        UNIQUE (message_fk, order_index)
    )",
    "CREATE INDEX IF NOT EXISTS idx_message_components_message ON message_components (message_fk)",
    "CREATE TABLE IF NOT EXISTS files (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        component_fk     INTEGER NOT NULL UNIQUE REFERENCES message_components (id) ON DELETE CASCADE,
        file_name        TEXT,
        storage_path     TEXT,
        upload_timestamp INTEGER
    )",
];

const POSTGRES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id          BIGSERIAL    PRIMARY KEY,
        message_id  VARCHAR(255) NOT NULL UNIQUE,
        session_id  VARCHAR(255),
        sender_id   VARCHAR(255),
        timestamp   BIGINT,
        raw_payload JSONB
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages (timestamp)",
    "CREATE TABLE IF NOT EXISTS message_components (
        id             BIGSERIAL   PRIMARY KEY,
        message_fk     BIGINT      NOT NULL REFERENCES messages (id) ON DELETE CASCADE,
        order_index    BIGINT      NOT NULL,
        component_type VARCHAR(50),
        component_data TEXT,
        UNIQUE (message_fk, order_index)
    )",
    "CREATE INDEX IF NOT EXISTS idx_message_components_message ON message_components (message_fk)",
    "CREATE TABLE IF NOT EXISTS files (
        id               BIGSERIAL     PRIMARY KEY,
        component_fk     BIGINT        NOT NULL UNIQUE REFERENCES message_components (id) ON DELETE CASCADE,
        file_name        VARCHAR(255),
        storage_path     VARCHAR(1024),
        upload_timestamp BIGINT
    )",
];

// MySQL has no `CREATE INDEX IF NOT EXISTS`, so indexes are declared inline.
const MYSQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        id          BIGINT       NOT NULL AUTO_INCREMENT PRIMARY KEY,
        message_id  VARCHAR(255) NOT NULL,
        session_id  VARCHAR(255),
        sender_id   VARCHAR(255),
        timestamp   BIGINT,
        raw_payload JSON,
        UNIQUE KEY uq_messages_message_id (message_id),
        KEY idx_messages_session (session_id),
        KEY idx_messages_sender (sender_id),
        KEY idx_messages_timestamp (timestamp)
    ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4",
    "CREATE TABLE IF NOT EXISTS message_components (
        id             BIGINT      NOT NULL AUTO_INCREMENT PRIMARY KEY,
        message_fk     BIGINT      NOT NULL,
        order_index    BIGINT      NOT NULL,
        component_type VARCHAR(50),
        component_data LONGTEXT,
        UNIQUE KEY uq_message_components_order (message_fk, order_index),
        KEY idx_message_components_message (message_fk),
        CONSTRAINT fk_message_components_message FOREIGN KEY (message_fk)
            REFERENCES messages (id) ON DELETE CASCADE
    ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4",
    "CREATE TABLE IF NOT EXISTS files (
        id               BIGINT        NOT NULL AUTO_INCREMENT PRIMARY KEY,
        component_fk     BIGINT        NOT NULL,
        file_name        VARCHAR(255),
        storage_path     VARCHAR(1024),
        upload_timestamp BIGINT,
        UNIQUE KEY uq_files_component (component_fk),
        CONSTRAINT fk_files_component FOREIGN KEY (component_fk)
            REFERENCES message_components (id) ON DELETE CASCADE
    ) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4",
];

/// DDL statements for the given dialect, in dependency order.
pub fn statements(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => SQLITE,
        Dialect::Postgres => POSTGRES,
        Dialect::MySql => MYSQL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_column_type_matches_encoding() {
        let messages = |d| statements(d)[0];
        assert!(messages(Dialect::Postgres).contains("raw_payload JSONB"));
        assert!(messages(Dialect::MySql).contains("raw_payload JSON,"));
        assert!(messages(Dialect::Sqlite).contains("raw_payload TEXT"));
    }

    #[test]
    fn every_dialect_cascades() {
        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            let cascades = statements(dialect)
                .iter()
                .filter(|s| s.contains("ON DELETE CASCADE"))
                .count();
            assert_eq!(cascades, 2, "{dialect}");
        }
    }
}
