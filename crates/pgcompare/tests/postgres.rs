//! Integration tests against real PostgreSQL.
//!
//! Run with: cargo nextest run -p pgcompare --features test-postgres --test postgres
//!
//! Uses POSTGRES_HOST / POSTGRES_PORT (user and password `postgres`) when set,
//! otherwise starts a container. Requires Docker in that case.

#![cfg(feature = "test-postgres")]

use pgcompare::{
    Credentials, DatabaseEndpoint, DifferenceKind, ErrorKind, Orchestrator, PostgresLoader,
    SchemaLoader, TableType,
};
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::NoTls;

/// Keeps the container alive for as long as the test needs it.
struct TestDb {
    _container: Option<ContainerAsync<Postgres>>,
    host: String,
    port: u16,
}

impl TestDb {
    async fn start() -> Self {
        if let (Ok(host), Ok(port)) = (
            std::env::var("POSTGRES_HOST"),
            std::env::var("POSTGRES_PORT"),
        ) {
            return Self {
                _container: None,
                host,
                port: port.parse().expect("POSTGRES_PORT must be a port number"),
            };
        }

        let container = Postgres::default()
            .start()
            .await
            .expect("failed to start postgres container");
        let host = container
            .get_host()
            .await
            .expect("container host")
            .to_string();
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("container port");

        Self {
            _container: Some(container),
            host,
            port,
        }
    }

    fn url(&self, dbname: &str) -> String {
        format!("postgres://{}:{}/{}", self.host, self.port, dbname)
    }

    fn endpoint(&self, name: &str, dbname: &str, schema: Option<&str>) -> DatabaseEndpoint {
        DatabaseEndpoint::new(
            name,
            self.url(dbname),
            Credentials::new("postgres", Some("postgres".to_string())),
            schema,
        )
        .unwrap()
    }

    async fn execute(&self, dbname: &str, sql: &str) {
        let conn_str = format!(
            "host={} port={} user=postgres password=postgres dbname={}",
            self.host, self.port, dbname
        );

        let mut attempts = 0;
        let (client, connection) = loop {
            attempts += 1;
            match tokio_postgres::connect(&conn_str, NoTls).await {
                Ok(result) => break result,
                Err(e) if attempts < 10 => {
                    tracing::debug!("connection attempt {} failed: {}, retrying", attempts, e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => panic!("failed to connect after {} attempts: {}", attempts, e),
            }
        };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("connection error: {}", e);
            }
        });

        client.batch_execute(sql).await.expect("failed to run setup SQL");
    }
}

const BASE_SCHEMA: &str = r#"
CREATE SCHEMA app;

CREATE TABLE app.customer (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(120) NOT NULL,
    name VARCHAR(50),
    balance NUMERIC(12, 2) NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX customer_email_idx ON app.customer (email);

CREATE TABLE app.invoice (
    customer_id BIGINT NOT NULL,
    number INT NOT NULL,
    issued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (customer_id, number)
);
CREATE INDEX invoice_issued_idx ON app.invoice (issued_at, customer_id);
CREATE INDEX invoice_number_idx ON app.invoice (number, issued_at);

CREATE VIEW app.big_spender AS SELECT id, email FROM app.customer WHERE balance > 1000;
"#;

const DRIFTED_SCHEMA: &str = r#"
CREATE SCHEMA app;

CREATE TABLE app.customer (
    id BIGSERIAL PRIMARY KEY,
    email VARCHAR(200) NOT NULL,
    balance NUMERIC(12, 2) NOT NULL DEFAULT 0,
    nickname TEXT
);
CREATE INDEX customer_email_idx ON app.customer (email);

CREATE TABLE app.invoice (
    customer_id BIGINT NOT NULL,
    number INT NOT NULL,
    issued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (number)
);
CREATE INDEX invoice_issued_idx ON app.invoice (customer_id, issued_at);
CREATE INDEX invoice_number_idx ON app.invoice (number) INCLUDE (issued_at);

CREATE TABLE app.audit_log (id BIGINT);
"#;

#[tokio::test]
async fn test_loader_reads_catalog() {
    let db = TestDb::start().await;
    db.execute("postgres", "CREATE DATABASE base_db").await;
    db.execute("base_db", BASE_SCHEMA).await;

    let snapshot = PostgresLoader::new()
        .load(&db.endpoint("base", "base_db", Some("app")))
        .await
        .unwrap();

    assert_eq!(snapshot.schema_name, "app");
    let names: Vec<_> = snapshot.tables.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["big_spender", "customer", "invoice"]);
    assert_eq!(
        snapshot.get_table("big_spender").unwrap().table_type,
        TableType::View
    );

    let customer = snapshot.get_table("customer").unwrap();
    let columns: Vec<_> = customer.columns.keys().map(String::as_str).collect();
    assert_eq!(columns, vec!["id", "email", "name", "balance"]);
    assert_eq!(
        customer.column("email").unwrap().signature(),
        "character varying(120) NOT NULL"
    );
    assert_eq!(
        customer.column("balance").unwrap().signature(),
        "numeric(12,2) NOT NULL DEFAULT 0"
    );
    assert_eq!(customer.primary_key_display(), "id");
    assert!(customer.index("customer_pkey").is_none());
    let email_idx = customer.index("customer_email_idx").unwrap();
    assert!(email_idx.unique);
    assert_eq!(email_idx.method, "btree");
    assert_eq!(email_idx.columns, vec!["email"]);

    let invoice = snapshot.get_table("invoice").unwrap();
    assert_eq!(invoice.primary_key_display(), "customer_id, number");
    assert_eq!(
        invoice.index("invoice_issued_idx").unwrap().columns,
        vec!["issued_at", "customer_id"]
    );
    let number_idx = invoice.index("invoice_number_idx").unwrap();
    assert_eq!(number_idx.columns, vec!["number", "issued_at"]);
    assert!(number_idx.include.is_empty());
}

#[tokio::test]
async fn test_loader_separates_include_columns() {
    let db = TestDb::start().await;
    db.execute("postgres", "CREATE DATABASE include_db").await;
    db.execute("include_db", DRIFTED_SCHEMA).await;

    let snapshot = PostgresLoader::new()
        .load(&db.endpoint("drifted", "include_db", Some("app")))
        .await
        .unwrap();

    let number_idx = snapshot
        .get_table("invoice")
        .unwrap()
        .index("invoice_number_idx")
        .unwrap();
    assert_eq!(number_idx.columns, vec!["number"]);
    assert_eq!(number_idx.include, vec!["issued_at"]);
    assert_eq!(number_idx.signature(), "btree (number) INCLUDE (issued_at)");
}

#[tokio::test]
async fn test_loader_missing_schema() {
    let db = TestDb::start().await;

    let err = PostgresLoader::new()
        .load(&db.endpoint("base", "postgres", Some("does_not_exist")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Introspection);
    assert!(err.to_string().contains("does_not_exist"));
}

#[tokio::test]
async fn test_loader_unreachable_host() {
    let endpoint = DatabaseEndpoint::new(
        "nowhere",
        "postgres://127.0.0.1:1/app",
        Credentials::new("postgres", None),
        None,
    )
    .unwrap();

    let err = PostgresLoader::new()
        .with_connect_timeout(Duration::from_secs(2))
        .load(&endpoint)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connectivity);
}

#[tokio::test]
async fn test_compare_live_databases() {
    let db = TestDb::start().await;
    db.execute("postgres", "CREATE DATABASE cmp_base").await;
    db.execute("postgres", "CREATE DATABASE cmp_same").await;
    db.execute("postgres", "CREATE DATABASE cmp_drifted").await;
    db.execute("cmp_base", BASE_SCHEMA).await;
    db.execute("cmp_same", BASE_SCHEMA).await;
    db.execute("cmp_drifted", DRIFTED_SCHEMA).await;

    let base = db.endpoint("base", "cmp_base", Some("app"));
    let targets = vec![
        db.endpoint("same", "cmp_same", Some("app")),
        db.endpoint("drifted", "cmp_drifted", Some("app")),
        db.endpoint("missing", "cmp_drifted", Some("nope")),
    ];

    let report = Orchestrator::new(PostgresLoader::new())
        .run(&base, &targets)
        .await
        .unwrap();

    let same = report.outcome("same").unwrap();
    assert!(same.result.success);
    assert!(same.differences.is_empty());

    let missing = report.outcome("missing").unwrap();
    assert!(!missing.result.success);

    let drifted = report.outcome("drifted").unwrap();
    assert!(drifted.result.success);
    let kinds: Vec<_> = drifted
        .differences
        .iter()
        .map(|d| (d.kind, d.table_name.as_str(), d.item_name.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (DifferenceKind::MissingTable, "big_spender", "big_spender"),
            (DifferenceKind::ColumnDiff, "customer", "email"),
            (DifferenceKind::MissingColumn, "customer", "name"),
            (DifferenceKind::ExtraColumn, "customer", "nickname"),
            (DifferenceKind::IndexDiff, "customer", "customer_email_idx"),
            (DifferenceKind::PrimaryKeyDiff, "invoice", "PRIMARY_KEY"),
            (DifferenceKind::IndexDiff, "invoice", "invoice_issued_idx"),
            (DifferenceKind::IndexDiff, "invoice", "invoice_number_idx"),
            (DifferenceKind::ExtraTable, "audit_log", "audit_log"),
        ]
    );
    assert_eq!(
        drifted.differences[1].description,
        "character max length differs - base: 120, target: 200"
    );
    assert!(drifted.differences.iter().all(|d| d.schema_name == "app"));

    let summary = report.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.problem_targets.len(), 1);
}
