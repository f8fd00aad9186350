//! Helpers for tests that seed and inspect real stores.
//!
//! Enabled with the `test-utils` feature.

use chrono::DateTime;
use serde_json::Value as JsonValue;

use common::StoreError;

use crate::dynamodb::codec::{decode_item, encode_item, item_to_json, DirectItem};
use crate::dynamodb::condition::ExpressionBuilder;
use crate::dynamodb::repo::{collect_pages, Page, PageStop};
use crate::dynamodb::DynamoDbCursor;
use crate::mongo::MongoCursor;
use crate::postgres::repo::build_insert;
use crate::postgres::{map_db_err, PgRecord, PostgresCursor};

// =============================================================================
// Record comparison
// =============================================================================

/// Compare records field by field, returning the first mismatch.
///
/// Only the keys present in `expected` are checked. `null` matches a
/// missing key, timestamps compare by instant, and nested objects and
/// lists of objects are compared recursively.
pub fn check_expected_data(result: &[JsonValue], expected: &[JsonValue]) -> Result<(), String> {
    if result.len() != expected.len() {
        return Err(format!(
            "expected {} records, got {}",
            expected.len(),
            result.len()
        ));
    }
    for (got, want) in result.iter().zip(expected) {
        check_record(got, want)?;
    }
    Ok(())
}

/// Panicking form of [`check_expected_data`].
pub fn assert_expected_data(result: &[JsonValue], expected: &[JsonValue]) {
    if let Err(msg) = check_expected_data(result, expected) {
        panic!("{msg}");
    }
}

fn check_record(got: &JsonValue, want: &JsonValue) -> Result<(), String> {
    let Some(want) = want.as_object() else {
        return check_value("<root>", Some(got), want);
    };
    for (key, value) in want {
        check_value(key, got.get(key), value)?;
    }
    Ok(())
}

fn check_value(key: &str, got: Option<&JsonValue>, want: &JsonValue) -> Result<(), String> {
    let got_value = got.unwrap_or(&JsonValue::Null);
    match want {
        JsonValue::Null if got_value.is_null() => Ok(()),
        JsonValue::Object(_) => check_record(got_value, want).map_err(|e| format!("key={key} {e}")),
        JsonValue::Array(items) if items.first().is_some_and(JsonValue::is_object) => {
            let got_items = got_value.as_array().map(Vec::as_slice).unwrap_or_default();
            check_expected_data(got_items, items).map_err(|e| format!("key={key} {e}"))
        }
        JsonValue::String(w) if same_instant(got_value, w) => Ok(()),
        _ if got_value == want => Ok(()),
        _ => Err(format!("key={key} {got_value}!={want}")),
    }
}

fn same_instant(got: &JsonValue, want: &str) -> bool {
    let (Some(got), Ok(want)) = (got.as_str(), DateTime::parse_from_rfc3339(want)) else {
        return false;
    };
    DateTime::parse_from_rfc3339(got).is_ok_and(|got| got == want)
}

/// Records ordered by their `id` field.
pub fn sorted_by_id(mut records: Vec<JsonValue>) -> Vec<JsonValue> {
    records.sort_by(|a, b| {
        let a = a.get("id").map(JsonValue::to_string).unwrap_or_default();
        let b = b.get("id").map(JsonValue::to_string).unwrap_or_default();
        a.cmp(&b)
    });
    records
}

// =============================================================================
// Table utilities
// =============================================================================

/// Raw access to a Postgres table.
pub struct PgTableUtils {
    pub table: String,
}

impl PgTableUtils {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub async fn fetch_all(&self, curs: &PostgresCursor) -> Result<Vec<JsonValue>, StoreError> {
        use sea_orm::{DbBackend, FromQueryResult, Statement};

        let sql = format!(
            "SELECT * FROM {}.{}",
            crate::postgres::repo::quote_ident(curs.schema_name()),
            crate::postgres::repo::quote_ident(&self.table)
        );
        let rows = curs
            .query_all(Statement::from_string(DbBackend::Postgres, sql))
            .await
            .map_err(map_db_err)?;
        rows.iter()
            .map(|row| JsonValue::from_query_result(row, "").map_err(map_db_err))
            .collect()
    }

    /// Insert rows as given, ids and timestamps included.
    pub async fn insert_many(&self, curs: &PostgresCursor, items: Vec<PgRecord>) -> Result<(), StoreError> {
        for item in items {
            let stmt = build_insert(curs.schema_name(), &self.table, &item);
            curs.execute(stmt).await.map_err(map_db_err)?;
        }
        Ok(())
    }
}

/// Raw access to a Mongo collection; `id` is mapped to and from `_id`.
pub struct MongoCollectionUtils {
    pub collection: String,
}

impl MongoCollectionUtils {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }

    pub async fn fetch_all(&self, curs: &mut MongoCursor) -> Result<Vec<bson::Document>, StoreError> {
        use futures::TryStreamExt;

        let (db, session) = curs.parts();
        let mut cursor = db
            .collection::<bson::Document>(&self.collection)
            .find_with_session(None, None, session)
            .await
            .map_err(crate::mongo::map_mongo_err)?;

        let mut docs = Vec::new();
        while let Some(mut doc) = cursor
            .stream(session)
            .try_next()
            .await
            .map_err(crate::mongo::map_mongo_err)?
        {
            if let Some(id) = doc.remove("_id") {
                doc.insert("id", id);
            }
            docs.push(doc);
        }
        Ok(docs)
    }

    pub async fn insert_many(&self, curs: &mut MongoCursor, items: Vec<bson::Document>) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        let docs: Vec<bson::Document> = items
            .into_iter()
            .map(|mut doc| {
                if let Some(id) = doc.remove("id") {
                    doc.insert("_id", id);
                }
                doc
            })
            .collect();

        let (db, session) = curs.parts();
        db.collection::<bson::Document>(&self.collection)
            .insert_many_with_session(docs, None, session)
            .await
            .map_err(crate::mongo::map_mongo_err)?;
        Ok(())
    }
}

/// Scan and seed the single DynamoDB table.
pub struct DynamoDbTableUtils {
    pub scan_attributes: Vec<String>,
}

impl DynamoDbTableUtils {
    pub fn new<I, S>(scan_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scan_attributes: scan_attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub async fn fetch_all(&self, curs: &DynamoDbCursor) -> Result<Vec<JsonValue>, StoreError> {
        let items = collect_pages(
            |start| async move {
                let mut expr = ExpressionBuilder::default();
                let projection = expr.projection(&self.scan_attributes);
                let (names, _) = expr.into_parts();

                let output = curs
                    .client()
                    .scan()
                    .table_name(curs.table_name())
                    .set_projection_expression(projection)
                    .set_expression_attribute_names(names)
                    .set_exclusive_start_key(start)
                    .send()
                    .await
                    .map_err(|e| StoreError::base(format!("Scan failed: {e}")))?;

                Ok(Page {
                    items: output.items.unwrap_or_default(),
                    last_key: output.last_evaluated_key,
                })
            },
            PageStop::Limit(None),
        )
        .await?;

        Ok(items.iter().map(|i| item_to_json(&decode_item(i))).collect())
    }

    /// Put items as given; keys must already be present.
    pub async fn insert_many(&self, curs: &DynamoDbCursor, items: Vec<DirectItem>) -> Result<(), StoreError> {
        for item in items {
            curs.client()
                .put_item()
                .table_name(curs.table_name())
                .set_item(Some(encode_item(&item)))
                .send()
                .await
                .map_err(|e| StoreError::base(format!("PutItem failed: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_matches_missing_key() {
        let result = vec![json!({"id": "1", "name": "a"})];
        let expected = vec![json!({"id": "1", "deleted_at": null})];
        assert!(check_expected_data(&result, &expected).is_ok());
    }

    #[test]
    fn test_datetimes_compare_by_instant() {
        let result = vec![json!({"created_at": "2024-01-01T10:00:00Z"})];
        let expected = vec![json!({"created_at": "2024-01-01T10:00:00+00:00"})];
        assert!(check_expected_data(&result, &expected).is_ok());
    }

    #[test]
    fn test_nested_mismatch_names_the_key() {
        let result = vec![json!({"meta": {"lines": [{"qty": 1}]}})];
        let expected = vec![json!({"meta": {"lines": [{"qty": 2}]}})];

        let err = check_expected_data(&result, &expected).unwrap_err();
        assert_eq!(err, "key=meta key=lines key=qty 1!=2");
    }

    #[test]
    fn test_length_mismatch() {
        let err = check_expected_data(&[json!({})], &[]).unwrap_err();
        assert_eq!(err, "expected 0 records, got 1");
    }

    #[test]
    fn test_sorted_by_id() {
        let sorted = sorted_by_id(vec![json!({"id": "b"}), json!({"id": "a"})]);
        assert_eq!(sorted, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }
}
