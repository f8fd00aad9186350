//! Single-table repository helpers for DynamoDB.

use std::future::Future;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::ReturnValue;
use chrono::{DateTime, Utc};

use common::{new_id, StoreError};
use domain::constants::{FIELD_CREATED_AT, FIELD_UPDATED_AT};

use super::backend::DynamoDbCursor;
use super::codec::{decode_item, encode_item, item_to_json, AttributeMap, DirectItem, DirectValue};
use super::condition::{Condition, ExpressionBuilder};
use super::error::{map_delete_item_error, map_put_item_error, map_query_error, map_update_item_error};

// =============================================================================
// Query description
// =============================================================================

/// A key-condition query with its optional index, filter and projection.
#[derive(Debug, Clone)]
pub struct Query {
    key_condition: Condition,
    index_name: Option<String>,
    filter: Option<Condition>,
    projection: Vec<String>,
    ascending: bool,
    limit: Option<usize>,
}

impl Query {
    pub fn new(key_condition: Condition) -> Self {
        Self {
            key_condition,
            index_name: None,
            filter: None,
            projection: Vec::new(),
            ascending: true,
            limit: None,
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(condition);
        self
    }

    pub fn project<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    /// Maximum number of items; `0` means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    fn describe(&self) -> String {
        match &self.filter {
            Some(filter) => format!("{} {}", self.key_condition, filter),
            None => self.key_condition.to_string(),
        }
    }
}

/// One page of a query.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<AttributeMap>,
    pub last_key: Option<AttributeMap>,
}

/// When to stop following continuation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStop {
    /// Stop at the first page that returned anything.
    FirstMatch,
    /// Stop once this many items are collected (`None` reads everything).
    Limit(Option<usize>),
}

/// Follow continuation keys until `stop` is satisfied or pages run out.
pub async fn collect_pages<F, Fut>(mut fetch: F, stop: PageStop) -> Result<Vec<AttributeMap>, StoreError>
where
    F: FnMut(Option<AttributeMap>) -> Fut,
    Fut: Future<Output = Result<Page, StoreError>>,
{
    let mut items = Vec::new();
    let mut start_key = None;

    loop {
        let page = fetch(start_key.take()).await?;
        items.extend(page.items);

        let satisfied = match stop {
            PageStop::FirstMatch => !items.is_empty(),
            PageStop::Limit(Some(limit)) => items.len() >= limit,
            PageStop::Limit(None) => false,
        };
        match page.last_key {
            Some(key) if !satisfied => start_key = Some(key),
            _ => break,
        }
    }

    if let PageStop::Limit(Some(limit)) = stop {
        items.truncate(limit);
    }
    Ok(items)
}

async fn run_query(
    curs: &DynamoDbCursor,
    query: &Query,
    start_key: Option<AttributeMap>,
) -> Result<Page, StoreError> {
    let mut expr = ExpressionBuilder::default();
    let key_condition = expr.condition(&query.key_condition);
    let filter = query.filter.as_ref().map(|f| expr.condition(f));
    let projection = expr.projection(&query.projection);
    let (names, values) = expr.into_parts();

    let output = curs
        .client()
        .query()
        .table_name(curs.table_name())
        .key_condition_expression(key_condition)
        .set_filter_expression(filter)
        .set_projection_expression(projection)
        .set_index_name(query.index_name.clone())
        .scan_index_forward(query.ascending)
        .set_limit(query.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
        .set_expression_attribute_names(names)
        .set_expression_attribute_values(values)
        .set_exclusive_start_key(start_key)
        .send()
        .await
        .map_err(map_query_error)?;

    Ok(Page {
        items: output.items.unwrap_or_default(),
        last_key: output.last_evaluated_key,
    })
}

fn describe_item(item: &DirectItem) -> String {
    item_to_json(item).to_string()
}

// =============================================================================
// Repository trait
// =============================================================================

/// Repository over the single DynamoDB table.
///
/// Implementors decide the key layout: [`DynamoDbRepo::insert_primary_key`]
/// writes the key attributes into a new item and [`DynamoDbRepo::key_names`]
/// lists them for projections.
#[async_trait]
pub trait DynamoDbRepo: Send + Sync {
    fn create_id(&self) -> String {
        new_id()
    }

    fn utcnow(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Add the primary key attributes to `item` and return them.
    fn insert_primary_key(&self, item: &mut DirectItem) -> DirectItem;

    fn key_names(&self) -> Vec<String>;

    /// Entity fields plus the key attributes.
    fn projected_attributes(&self, fields: &[&str]) -> Vec<String> {
        fields
            .iter()
            .map(|f| f.to_string())
            .chain(self.key_names())
            .collect()
    }

    /// Put a new item; fails with `DuplicateKey` if any key attribute exists.
    async fn insert(
        &self,
        curs: &DynamoDbCursor,
        mut item: DirectItem,
        with_dates: bool,
    ) -> Result<DirectItem, StoreError> {
        let keys = self.insert_primary_key(&mut item);
        if with_dates {
            let now = DirectValue::DateTime(self.utcnow());
            item.insert(FIELD_CREATED_AT.to_owned(), now.clone());
            item.insert(FIELD_UPDATED_AT.to_owned(), now);
        }

        let mut expr = ExpressionBuilder::default();
        let condition = Condition::none_exist(keys.keys().cloned()).map(|c| expr.condition(&c));
        let (names, values) = expr.into_parts();

        curs.client()
            .put_item()
            .table_name(curs.table_name())
            .set_item(Some(encode_item(&item)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::None)
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &describe_item(&keys)))?;

        Ok(item)
    }

    /// Exactly one item matching the query. Without a projection only the
    /// key attributes are read.
    async fn find_one(&self, curs: &DynamoDbCursor, query: Query) -> Result<DirectItem, StoreError> {
        let query = if query.projection.is_empty() {
            query.project(self.key_names())
        } else {
            query
        };

        let items = collect_pages(|start| run_query(curs, &query, start), PageStop::FirstMatch).await?;
        match items.as_slice() {
            [item] => Ok(decode_item(item)),
            _ => Err(StoreError::not_found(format!(
                "element not found for query={}",
                query.describe()
            ))),
        }
    }

    async fn find_all(&self, curs: &DynamoDbCursor, query: Query) -> Result<Vec<DirectItem>, StoreError> {
        let stop = PageStop::Limit(query.limit);
        let items = collect_pages(|start| run_query(curs, &query, start), stop).await?;
        Ok(items.iter().map(decode_item).collect())
    }

    /// `SET` the supported fields plus `updated_at`; returns what was set.
    async fn update_one(
        &self,
        curs: &DynamoDbCursor,
        supported_attributes: &[&str],
        key: DirectItem,
        further_condition: Option<Condition>,
        changes: DirectItem,
    ) -> Result<DirectItem, StoreError> {
        let mut updates: DirectItem = changes
            .into_iter()
            .filter(|(k, _)| supported_attributes.contains(&k.as_str()))
            .collect();
        if updates.is_empty() {
            return Err(StoreError::base("at least one field to update must be passed"));
        }
        updates.insert(FIELD_UPDATED_AT.to_owned(), DirectValue::DateTime(self.utcnow()));

        let mut expr = ExpressionBuilder::default();
        let update_expression = set_expression(&mut expr, &updates);
        let condition = further_condition.as_ref().map(|c| expr.condition(c));
        let (names, values) = expr.into_parts();

        curs.client()
            .update_item()
            .table_name(curs.table_name())
            .set_key(Some(encode_item(&key)))
            .update_expression(update_expression)
            .set_condition_expression(condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(ReturnValue::None)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, &describe_item(&key)))?;

        Ok(updates)
    }

    async fn delete(&self, curs: &DynamoDbCursor, key: DirectItem) -> Result<(), StoreError> {
        curs.client()
            .delete_item()
            .table_name(curs.table_name())
            .set_key(Some(encode_item(&key)))
            .return_values(ReturnValue::None)
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, &describe_item(&key)))?;
        Ok(())
    }
}

/// `SET a = :u_a, b.c = :u_b_c` with values bound on `expr`.
pub fn set_expression(expr: &mut ExpressionBuilder, updates: &DirectItem) -> String {
    let assignments: Vec<String> = updates
        .iter()
        .map(|(name, value)| {
            let placeholder = format!(":u_{}", name.replace('.', "_"));
            expr.named_value(placeholder.clone(), value);
            format!("{name} = {placeholder}")
        })
        .collect();
    format!("SET {}", assignments.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::dynamodb::condition::Attr;

    struct OrdersRepo;

    impl DynamoDbRepo for OrdersRepo {
        fn insert_primary_key(&self, item: &mut DirectItem) -> DirectItem {
            let account = item.get("account_id").cloned().unwrap_or(DirectValue::Null);
            let pk = DirectValue::String(format!("ACCOUNT#{}", account.as_str().unwrap_or("")));
            let sk = DirectValue::String(format!("ORDER#{}", self.create_id()));
            item.insert("pk".into(), pk.clone());
            item.insert("sk".into(), sk.clone());
            DirectItem::from([("pk".to_string(), pk), ("sk".to_string(), sk)])
        }

        fn key_names(&self) -> Vec<String> {
            vec!["pk".into(), "sk".into()]
        }

        fn create_id(&self) -> String {
            "01".into()
        }
    }

    fn item(n: usize) -> AttributeMap {
        HashMap::from([("n".to_string(), AttributeValue::N(n.to_string()))])
    }

    fn page(range: std::ops::Range<usize>, more: bool) -> Page {
        Page {
            items: range.map(item).collect(),
            last_key: more.then(|| item(0)),
        }
    }

    #[test]
    fn test_insert_primary_key_and_projection() {
        let repo = OrdersRepo;
        let mut new_item = DirectItem::from([("account_id".to_string(), DirectValue::from("acc"))]);

        let keys = repo.insert_primary_key(&mut new_item);

        assert_eq!(keys.get("pk"), Some(&DirectValue::from("ACCOUNT#acc")));
        assert_eq!(new_item.get("sk"), Some(&DirectValue::from("ORDER#01")));
        assert_eq!(repo.projected_attributes(&["total"]), vec!["total", "pk", "sk"]);
    }

    #[test]
    fn test_set_expression_replaces_dots_in_placeholders() {
        let mut expr = ExpressionBuilder::default();
        let updates = DirectItem::from([
            ("address.city".to_string(), DirectValue::from("Rome")),
            ("total".to_string(), DirectValue::from(3)),
        ]);

        assert_eq!(
            set_expression(&mut expr, &updates),
            "SET address.city = :u_address_city, total = :u_total"
        );
        let (_, values) = expr.into_parts();
        assert_eq!(values.unwrap()[":u_address_city"], AttributeValue::S("Rome".into()));
    }

    #[test]
    fn test_set_expression_keeps_condition_values() {
        let mut expr = ExpressionBuilder::default();
        let updates = DirectItem::from([("v0".to_string(), DirectValue::from("new"))]);

        let update = set_expression(&mut expr, &updates);
        let condition = expr.condition(&Attr::new("state").eq("open"));
        let (_, values) = expr.into_parts();
        let values = values.unwrap();

        assert_eq!(update, "SET v0 = :u_v0");
        assert_eq!(condition, "#n0 = :v0");
        assert_eq!(values[":u_v0"], AttributeValue::S("new".into()));
        assert_eq!(values[":v0"], AttributeValue::S("open".into()));
    }

    #[test]
    fn test_query_limit_zero_means_unlimited() {
        let query = Query::new(Attr::new("pk").eq("A")).limit(0);
        assert_eq!(query.limit, None);
        let query = query.limit(5);
        assert_eq!(query.limit, Some(5));
    }

    #[tokio::test]
    async fn test_first_match_skips_empty_pages() {
        let calls = AtomicUsize::new(0);
        let items = collect_pages(
            |_start| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(match n {
                        0 | 1 => page(0..0, true),
                        _ => page(1..2, true),
                    })
                }
            },
            PageStop::FirstMatch,
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_limit_stops_and_truncates() {
        let calls = AtomicUsize::new(0);
        let items = collect_pages(
            |_start| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(page(0..3, true)) }
            },
            PageStop::Limit(Some(5)),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unlimited_reads_until_no_continuation() {
        let calls = AtomicUsize::new(0);
        let items = collect_pages(
            |start: Option<AttributeMap>| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(start.is_some(), n > 0);
                async move { Ok(page(0..2, n < 2)) }
            },
            PageStop::Limit(None),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 6);
    }

    #[tokio::test]
    async fn test_page_error_is_returned() {
        let result = collect_pages(
            |_start| async { Err(StoreError::base("Table not found")) },
            PageStop::FirstMatch,
        )
        .await;

        assert_eq!(result, Err(StoreError::base("Table not found")));
    }
}
