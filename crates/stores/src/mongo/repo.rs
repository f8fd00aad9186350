//! Collection helpers for repositories backed by MongoDB.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use mongodb::options::FindOneOptions;

use common::{new_id, StoreError};
use domain::constants::{FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT};

use super::backend::{map_mongo_err, MongoCursor};

const MONGO_ID: &str = "_id";

// =============================================================================
// Value helpers
// =============================================================================

pub fn bson_datetime(value: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(value))
}

/// A calendar date stored as a datetime at midnight.
pub fn bson_date(value: NaiveDate) -> Bson {
    bson_datetime(value.and_time(NaiveTime::MIN).and_utc())
}

/// A time of day stored on the first day of year 1.
pub fn bson_time(value: NaiveTime) -> Bson {
    let base = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    bson_datetime(base.and_time(value).and_utc())
}

/// Keep only the keys listed in `supported`.
pub fn supported_only(item: Document, supported: &[&str]) -> Document {
    item.into_iter()
        .filter(|(k, _)| supported.contains(&k.as_str()))
        .collect()
}

/// Copy `_id` into `id` so callers see the same shape as other stores.
pub fn with_public_id(mut item: Document) -> Document {
    if let Some(id) = item.get(MONGO_ID).cloned() {
        item.insert(FIELD_ID, id);
    }
    item
}

/// Merge raw update operators with the `updated_at` stamp.
pub fn stamped_operators(mut operators: Document, update_date: DateTime<Utc>) -> Document {
    match operators.get_document_mut("$set") {
        Ok(set) => {
            set.insert(FIELD_UPDATED_AT, bson_datetime(update_date));
        }
        Err(_) => {
            operators.insert("$set", doc! { FIELD_UPDATED_AT: bson_datetime(update_date) });
        }
    }
    operators
}

fn not_found(query: &Document) -> StoreError {
    StoreError::not_found(format!("element not found for query={query}"))
}

// =============================================================================
// Repository trait
// =============================================================================

#[async_trait]
pub trait MongoRepo: Send + Sync {
    fn create_id(&self) -> String {
        new_id()
    }

    fn utcnow(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Insert a document keyed by `new_id` (or a fresh id) and return it with `id` set.
    async fn insert(
        &self,
        curs: &mut MongoCursor,
        collection: &str,
        mut item: Document,
        new_id: Option<String>,
    ) -> Result<Document, StoreError> {
        let now = bson_datetime(self.utcnow());
        item.remove(FIELD_ID);
        item.insert(MONGO_ID, new_id.unwrap_or_else(|| self.create_id()));
        item.insert(FIELD_CREATED_AT, now.clone());
        item.insert(FIELD_UPDATED_AT, now);

        let (db, session) = curs.parts();
        db.collection::<Document>(collection)
            .insert_one_with_session(&item, None, session)
            .await
            .map_err(map_mongo_err)?;

        Ok(with_public_id(item))
    }

    async fn find_one(
        &self,
        curs: &mut MongoCursor,
        collection: &str,
        query: Document,
        sort: Option<Document>,
    ) -> Result<Document, StoreError> {
        let mut options = FindOneOptions::default();
        options.sort = sort;

        let (db, session) = curs.parts();
        db.collection::<Document>(collection)
            .find_one_with_session(query.clone(), options, session)
            .await
            .map_err(map_mongo_err)?
            .map(with_public_id)
            .ok_or_else(|| not_found(&query))
    }

    /// `$set` the supported fields plus `updated_at`; returns what was set.
    async fn update_one(
        &self,
        curs: &mut MongoCursor,
        collection: &str,
        supported_attributes: &[&str],
        query: Document,
        changes: Document,
    ) -> Result<Document, StoreError> {
        let mut updates = supported_only(changes, supported_attributes);
        if updates.is_empty() {
            return Err(StoreError::base("at least one field to update must be passed"));
        }
        updates.insert(FIELD_UPDATED_AT, bson_datetime(self.utcnow()));

        let (db, session) = curs.parts();
        let result = db
            .collection::<Document>(collection)
            .update_one_with_session(query.clone(), doc! { "$set": updates.clone() }, None, session)
            .await
            .map_err(map_mongo_err)?;

        if result.matched_count != 1 {
            return Err(not_found(&query));
        }
        Ok(updates)
    }

    /// Apply raw update operators (`$push`, `$pull`, ...); returns the update date.
    async fn update_one_list(
        &self,
        curs: &mut MongoCursor,
        collection: &str,
        supported_attributes: &[&str],
        query: Document,
        operators: Document,
    ) -> Result<DateTime<Utc>, StoreError> {
        let operators = supported_only(operators, supported_attributes);
        if operators.is_empty() {
            return Err(StoreError::base("at least one field to update must be passed"));
        }
        let update_date = self.utcnow();

        let (db, session) = curs.parts();
        let result = db
            .collection::<Document>(collection)
            .update_one_with_session(
                query.clone(),
                stamped_operators(operators, update_date),
                None,
                session,
            )
            .await
            .map_err(map_mongo_err)?;

        if result.matched_count != 1 {
            return Err(not_found(&query));
        }
        Ok(update_date)
    }
}
