//! Raw-statement repository helpers for Postgres tables.
//!
//! Identifiers are always quoted and values always bound, so callers can
//! pass column names coming from their own records without escaping them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::ArrayType;
use sea_orm::{DbBackend, FromQueryResult, JsonValue, Statement, Value};

use common::{new_id, StoreError};
use domain::constants::{FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};

use super::backend::{map_db_err, PostgresCursor};

/// A row to write: column name to bound value.
pub type PgRecord = BTreeMap<String, Value>;

/// Restricts a statement to rows owned by an account.
#[derive(Debug, Clone, Copy)]
pub struct AccountScope<'a> {
    pub field: &'a str,
    pub value: &'a str,
}

impl<'a> AccountScope<'a> {
    pub fn new(field: &'a str, value: &'a str) -> Self {
        Self { field, value }
    }
}

// =============================================================================
// Statement builders
// =============================================================================

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_ident(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Cast appended to a placeholder so JSON values land in JSONB columns.
pub fn cast_token(value: &Value) -> &'static str {
    match value {
        Value::Json(Some(json)) if json.is_object() => "::JSONB",
        Value::Array(ArrayType::Json, _) => "::JSONB[]",
        _ => "",
    }
}

fn scope_filter(scope: Option<AccountScope<'_>>, values: &mut Vec<Value>) -> String {
    match scope {
        Some(scope) if !scope.field.is_empty() && !scope.value.is_empty() => {
            values.push(Value::from(scope.value.to_owned()));
            format!(" AND {} = ${}", quote_ident(scope.field), values.len())
        }
        _ => String::new(),
    }
}

pub fn build_insert(schema: &str, table: &str, record: &PgRecord) -> Statement {
    let cols: Vec<String> = record.keys().map(|k| quote_ident(k)).collect();
    let placeholders: Vec<String> = record
        .values()
        .enumerate()
        .map(|(i, v)| format!("${}{}", i + 1, cast_token(v)))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table_ident(schema, table),
        cols.join(", "),
        placeholders.join(", ")
    );
    Statement::from_sql_and_values(DbBackend::Postgres, sql, record.values().cloned())
}

pub fn build_update(schema: &str, table: &str, id: &str, updates: &PgRecord) -> Statement {
    let mut values = vec![Value::from(id.to_owned())];
    let mut sets = Vec::with_capacity(updates.len());
    for (col, value) in updates {
        values.push(value.clone());
        sets.push(format!(
            "{} = ${}{}",
            quote_ident(col),
            values.len(),
            cast_token(value)
        ));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE id = $1 RETURNING *",
        table_ident(schema, table),
        sets.join(", ")
    );
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

pub fn build_select_by_id(
    schema: &str,
    table: &str,
    id: &str,
    for_update: bool,
    scope: Option<AccountScope<'_>>,
) -> Statement {
    let mut values = vec![Value::from(id.to_owned())];
    let filter = scope_filter(scope, &mut values);
    let lock = if for_update { " FOR UPDATE" } else { "" };

    let sql = format!(
        "SELECT * FROM {} WHERE id = $1{}{}",
        table_ident(schema, table),
        filter,
        lock
    );
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

pub fn build_delete(
    schema: &str,
    table: &str,
    id: &str,
    scope: Option<AccountScope<'_>>,
) -> Statement {
    let mut values = vec![Value::from(id.to_owned())];
    let filter = scope_filter(scope, &mut values);

    let sql = format!("DELETE FROM {} WHERE id = $1{}", table_ident(schema, table), filter);
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

// =============================================================================
// Repository trait
// =============================================================================

/// Table-level CRUD for repositories backed by Postgres.
///
/// Implementors only need to exist; every operation has a default. Override
/// [`PostgresRepo::create_id`] or [`PostgresRepo::utcnow`] to pin ids and
/// timestamps in tests.
#[async_trait]
pub trait PostgresRepo: Send + Sync {
    fn create_id(&self) -> String {
        new_id()
    }

    fn utcnow(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Insert a row with a fresh id and timestamps, returning the stored row.
    async fn insert(
        &self,
        curs: &PostgresCursor,
        table: &str,
        mut item: PgRecord,
    ) -> Result<JsonValue, StoreError> {
        let now = self.utcnow();
        item.insert(FIELD_ID.to_owned(), Value::from(self.create_id()));
        item.insert(FIELD_CREATED_AT.to_owned(), Value::from(now));
        item.insert(FIELD_UPDATED_AT.to_owned(), Value::from(now));

        let stmt = build_insert(curs.schema_name(), table, &item);
        let row = curs
            .query_one(stmt)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| StoreError::base(format!("insert into {table} returned no row")))?;

        JsonValue::from_query_result(&row, "").map_err(map_db_err)
    }

    /// Update the supported columns of a row, returning the stored row.
    async fn update(
        &self,
        curs: &PostgresCursor,
        table: &str,
        supported_attributes: &[&str],
        item_id: &str,
        changes: PgRecord,
    ) -> Result<JsonValue, StoreError> {
        let mut updates: PgRecord = changes
            .into_iter()
            .filter(|(k, _)| supported_attributes.contains(&k.as_str()))
            .collect();
        if updates.is_empty() {
            return Err(StoreError::base("at least one field to update must be passed"));
        }
        updates.insert(FIELD_UPDATED_AT.to_owned(), Value::from(self.utcnow()));

        let stmt = build_update(curs.schema_name(), table, item_id, &updates);
        let row = curs
            .query_one(stmt)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| StoreError::not_found(format!("not found for id={item_id}")))?;

        JsonValue::from_query_result(&row, "").map_err(map_db_err)
    }

    async fn get_by_id(
        &self,
        curs: &PostgresCursor,
        table: &str,
        elem_id: &str,
        for_update: bool,
        scope: Option<AccountScope<'_>>,
    ) -> Result<JsonValue, StoreError> {
        let stmt = build_select_by_id(curs.schema_name(), table, elem_id, for_update, scope);
        let row = curs
            .query_one(stmt)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| StoreError::not_found(format!("element not found for id={elem_id}")))?;

        JsonValue::from_query_result(&row, "").map_err(map_db_err)
    }

    async fn delete(
        &self,
        curs: &PostgresCursor,
        table: &str,
        elem_id: &str,
        scope: Option<AccountScope<'_>>,
    ) -> Result<(), StoreError> {
        let stmt = build_delete(curs.schema_name(), table, elem_id, scope);
        curs.execute(stmt).await.map_err(map_db_err)?;
        Ok(())
    }
}
