//! Catalog introspection for PostgreSQL.
//!
//! [`introspect`] reads tables, columns, primary keys and secondary indexes of
//! one schema into a [`SchemaSnapshot`]. [`PostgresLoader`] wraps it with
//! connection management and implements [`SchemaLoader`].
//!
//! Catalog columns use SQL domain types (`sql_identifier`, `cardinal_number`,
//! ...) that tokio-postgres won't decode, so every query casts them to plain
//! `text` / `int4`.

use crate::traced::{Connection, ConnectionExt};
use crate::{BoxFuture, DatabaseEndpoint, Error, Result, SchemaLoader};
use pgcompare_schema::{
    ColumnDescriptor, IndexDescriptor, SchemaSnapshot, TableDescriptor, TableType,
};
use std::time::Duration;

const SCHEMA_EXISTS_SQL: &str = r#"
SELECT 1
FROM pg_catalog.pg_namespace
WHERE nspname = $1
"#;

const TABLES_SQL: &str = r#"
SELECT table_name::text, table_type::text
FROM information_schema.tables
WHERE table_schema = $1
ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
SELECT
    table_name::text,
    column_name::text,
    data_type::text,
    is_nullable::text,
    column_default::text,
    character_maximum_length::int4,
    numeric_precision::int4,
    numeric_scale::int4
FROM information_schema.columns
WHERE table_schema = $1
ORDER BY table_name, ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
SELECT tc.table_name::text, kcu.column_name::text
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
    ON tc.constraint_name = kcu.constraint_name
    AND tc.table_schema = kcu.table_schema
    AND tc.table_name = kcu.table_name
WHERE tc.constraint_type = 'PRIMARY KEY'
    AND tc.table_schema = $1
ORDER BY tc.table_name, kcu.ordinal_position
"#;

const INDEXES_SQL: &str = r#"
SELECT
    t.relname::text AS table_name,
    i.relname::text AS index_name,
    ix.indisunique,
    am.amname::text AS method,
    ARRAY(
        SELECT pg_get_indexdef(ix.indexrelid, k, true)
        FROM generate_series(1, ix.indnkeyatts) AS k
        ORDER BY k
    ) AS columns,
    ARRAY(
        SELECT pg_get_indexdef(ix.indexrelid, k, true)
        FROM generate_series(ix.indnkeyatts + 1, ix.indnatts) AS k
        ORDER BY k
    ) AS include
FROM pg_index ix
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_class t ON t.oid = ix.indrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN pg_am am ON am.oid = i.relam
WHERE n.nspname = $1
    AND NOT ix.indisprimary
ORDER BY t.relname, i.relname
"#;

/// Read the structure of `schema` over an open connection.
///
/// Returns `Ok(None)` when the schema does not exist.
pub async fn introspect<C: Connection>(
    conn: &C,
    schema: &str,
) -> std::result::Result<Option<SchemaSnapshot>, tokio_postgres::Error> {
    let conn = conn.traced();

    if conn.query_opt(SCHEMA_EXISTS_SQL, &[&schema]).await?.is_none() {
        return Ok(None);
    }

    let mut snapshot = SchemaSnapshot::new(schema);

    for row in conn.query(TABLES_SQL, &[&schema]).await? {
        let name: String = row.get(0);
        let table_type: String = row.get(1);
        snapshot.insert_table(TableDescriptor::with_type(
            name,
            TableType::parse(&table_type),
        ));
    }

    for row in conn.query(COLUMNS_SQL, &[&schema]).await? {
        let table_name: String = row.get(0);
        let Some(table) = snapshot.get_table_mut(&table_name) else {
            tracing::debug!(table = %table_name, "skipping columns of unlisted table");
            continue;
        };
        let is_nullable: String = row.get(3);
        let column = ColumnDescriptor {
            name: row.get(1),
            data_type: row.get(2),
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default: row.get(4),
            character_max_length: row.get(5),
            numeric_precision: row.get(6),
            numeric_scale: row.get(7),
        };
        table.columns.insert(column.name.clone(), column);
    }

    for row in conn.query(PRIMARY_KEYS_SQL, &[&schema]).await? {
        let table_name: String = row.get(0);
        if let Some(table) = snapshot.get_table_mut(&table_name) {
            table.primary_key.insert(row.get(1));
        }
    }

    for row in conn.query(INDEXES_SQL, &[&schema]).await? {
        let table_name: String = row.get(0);
        let Some(table) = snapshot.get_table_mut(&table_name) else {
            continue;
        };
        let index = IndexDescriptor {
            name: row.get(1),
            unique: row.get(2),
            method: row.get(3),
            columns: row.get(4),
            include: row.get(5),
        };
        table.indexes.insert(index.name.clone(), index);
    }

    Ok(Some(snapshot))
}

/// Loads snapshots from live PostgreSQL databases.
///
/// Each call opens its own connection and closes it before returning.
#[derive(Debug, Clone)]
pub struct PostgresLoader {
    connect_timeout: Option<Duration>,
}

impl Default for PostgresLoader {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl PostgresLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long to wait for a connection to be established.
    ///
    /// `None`, or a zero duration, waits as long as the OS does.
    pub fn with_connect_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.connect_timeout = timeout.into().filter(|t| !t.is_zero());
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    async fn load_snapshot(&self, endpoint: &DatabaseEndpoint) -> Result<SchemaSnapshot> {
        let mut config = endpoint
            .pg_config()
            .map_err(|e| Error::connectivity(endpoint.display_name(), e))?;
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }

        tracing::debug!(
            endpoint = %endpoint.display_name(),
            locator = %endpoint.masked_locator(),
            "connecting"
        );
        let (client, connection) = config
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(|e| Error::connectivity(endpoint.display_name(), e))?;

        let display_name = endpoint.display_name().to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(endpoint = %display_name, "connection closed with error: {}", e);
            }
        });

        // The client is dropped on every path out of here, which closes the connection.
        let snapshot = introspect(&client, endpoint.schema())
            .await
            .map_err(|e| Error::introspection(endpoint.display_name(), endpoint.schema(), e))?;

        snapshot.ok_or_else(|| Error::SchemaNotFound {
            endpoint: endpoint.display_name().to_string(),
            schema: endpoint.schema().to_string(),
        })
    }
}

impl SchemaLoader for PostgresLoader {
    fn load<'a>(&'a self, endpoint: &'a DatabaseEndpoint) -> BoxFuture<'a, Result<SchemaSnapshot>> {
        Box::pin(self.load_snapshot(endpoint))
    }
}
