//! Postgres round trips against a live database.
//!
//! Run with `POSTGRES_*` variables set and `--ignored`. The table is created
//! in the configured schema and dropped afterwards.

use sea_orm::{DbBackend, Statement, Value};

use common::{EnvReader, PostgresSettings, StoreError};
use stores::postgres::{PgRecord, PostgresBackend, PostgresConnection, PostgresRepo};
use stores::testing::{check_expected_data, PgTableUtils};

const TABLE: &str = "store_test_items";

struct ItemsRepo;

impl PostgresRepo for ItemsRepo {}

async fn connection() -> PostgresConnection {
    let settings = PostgresSettings::from_reader(&EnvReader::process()).expect("POSTGRES_* variables");
    PostgresConnection::connected(PostgresBackend::new(settings))
        .await
        .expect("database reachable")
}

async fn recreate_table(conn: &PostgresConnection) {
    let mut session = conn.session(true).await.unwrap();
    let schema = session.cursor().schema_name().to_owned();
    for sql in [
        format!("DROP TABLE IF EXISTS \"{schema}\".\"{TABLE}\""),
        format!(
            "CREATE TABLE \"{schema}\".\"{TABLE}\" (id TEXT PRIMARY KEY, name TEXT UNIQUE, meta JSONB, \
             created_at TIMESTAMPTZ, updated_at TIMESTAMPTZ)"
        ),
    ] {
        session
            .cursor()
            .execute(Statement::from_string(DbBackend::Postgres, sql))
            .await
            .unwrap();
    }
    session.finish(Ok::<_, StoreError>(())).await.unwrap();
}

fn record(name: &str) -> PgRecord {
    let mut item = PgRecord::new();
    item.insert("name".into(), Value::from(name.to_owned()));
    item.insert("meta".into(), Value::from(serde_json::json!({"tags": ["a"]})));
    item
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_insert_update_and_rollback() {
    let conn = connection().await;
    recreate_table(&conn).await;
    let repo = ItemsRepo;

    let mut session = conn.session(false).await.unwrap();
    let inserted = repo.insert(session.cursor(), TABLE, record("first")).await;
    let inserted = session.finish(inserted).await.unwrap();
    let id = inserted["id"].as_str().unwrap().to_owned();

    let mut session = conn.session(false).await.unwrap();
    let mut changes = PgRecord::new();
    changes.insert("name".into(), Value::from("renamed".to_owned()));
    let updated = repo.update(session.cursor(), TABLE, &["name"], &id, changes).await;
    session.finish(updated).await.unwrap();

    // A duplicate insert fails and rolls back the whole session.
    let mut session = conn.session(false).await.unwrap();
    let result = async {
        repo.insert(session.cursor(), TABLE, record("other")).await?;
        repo.insert(session.cursor(), TABLE, record("renamed")).await
    }
    .await;
    let err = session.finish(result).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));

    let mut session = conn.session(true).await.unwrap();
    let rows = PgTableUtils::new(TABLE).fetch_all(session.cursor()).await;
    let rows = session.finish(rows).await.unwrap();

    check_expected_data(
        &rows,
        &[serde_json::json!({"id": id, "name": "renamed", "meta": {"tags": ["a"]}})],
    )
    .unwrap();
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn test_get_by_id_missing() {
    let conn = connection().await;
    recreate_table(&conn).await;

    let mut session = conn.session(true).await.unwrap();
    let result = ItemsRepo
        .get_by_id(session.cursor(), TABLE, "missing", false, None)
        .await;
    let err = session.finish(result).await.unwrap_err();

    assert_eq!(err, StoreError::not_found("element not found for id=missing"));
}
