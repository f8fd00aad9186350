//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to [`StoreError`].

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;

use common::StoreError;

fn dispatch_failure<E, R>(err: &SdkError<E, R>) -> Option<StoreError> {
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(StoreError::Connection("DynamoDB is not reachable".to_string()))
        }
        _ => None,
    }
}

pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> StoreError {
    if let Some(mapped) = dispatch_failure(&err) {
        return mapped;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => StoreError::base("Table not found"),
        QueryError::ProvisionedThroughputExceededException(_) => {
            StoreError::base("Throughput exceeded, please retry")
        }
        QueryError::RequestLimitExceeded(_) => StoreError::base("Request limit exceeded, please retry"),
        QueryError::InternalServerError(_) => StoreError::base("DynamoDB internal server error"),
        err => StoreError::base(format!("Query failed: {:?}", err)),
    }
}

/// A failed put condition means the keys are already taken.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    keys: &str,
) -> StoreError {
    if let Some(mapped) = dispatch_failure(&err) {
        return mapped;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => {
            StoreError::duplicate_key(format!("element already exists: {keys}"))
        }
        PutItemError::ResourceNotFoundException(_) => StoreError::base("Table not found"),
        PutItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::base("Throughput exceeded, please retry")
        }
        PutItemError::RequestLimitExceeded(_) => StoreError::base("Request limit exceeded, please retry"),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::base("Item collection size limit exceeded")
        }
        PutItemError::TransactionConflictException(_) => {
            StoreError::base("Transaction conflict, please retry")
        }
        PutItemError::InternalServerError(_) => StoreError::base("DynamoDB internal server error"),
        err => StoreError::base(format!("PutItem failed: {:?}", err)),
    }
}

/// A failed update condition means no element matched.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    key: &str,
) -> StoreError {
    if let Some(mapped) = dispatch_failure(&err) {
        return mapped;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => {
            StoreError::not_found(format!("element not found for key={key}"))
        }
        UpdateItemError::ResourceNotFoundException(_) => StoreError::base("Table not found"),
        UpdateItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::base("Throughput exceeded, please retry")
        }
        UpdateItemError::RequestLimitExceeded(_) => {
            StoreError::base("Request limit exceeded, please retry")
        }
        UpdateItemError::TransactionConflictException(_) => {
            StoreError::base("Transaction conflict, please retry")
        }
        UpdateItemError::InternalServerError(_) => StoreError::base("DynamoDB internal server error"),
        err => StoreError::base(format!("UpdateItem failed: {:?}", err)),
    }
}

pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    key: &str,
) -> StoreError {
    if let Some(mapped) = dispatch_failure(&err) {
        return mapped;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => {
            StoreError::not_found(format!("element not found for key={key}"))
        }
        DeleteItemError::ResourceNotFoundException(_) => StoreError::base("Table not found"),
        DeleteItemError::InternalServerError(_) => StoreError::base("DynamoDB internal server error"),
        err => StoreError::base(format!("DeleteItem failed: {:?}", err)),
    }
}
