//! Data-access subsystem.
//!
//! # Responsibilities
//! - Define the `find_many` / `count` contract the list routine relies on
//! - Run both calls for a merged [`ListRequest`] and attach pagination
//! - Provide an in-process [`MemoryStore`] implementation
//!
//! # Design Decisions
//! - The contract mirrors an ORM: `where`, `orderBy`, `skip`, `take`, `include`
//! - Object-valued record fields are relations, loaded only when included

pub mod memory;

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::query::{IncludeMap, ListRequest, Paginated, PaginationMeta, SortKey, WhereClause};

pub use memory::{MemoryCollection, MemoryStore};

/// Errors raised by a data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Collection is not registered.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// No live record with this id.
    #[error("Record {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    /// Payload is not a JSON object or tries to overwrite a managed field.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Seed file could not be read or parsed.
    #[error("Seed error: {0}")]
    Seed(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Arguments of a single `find_many` call.
#[derive(Debug, Clone, Copy)]
pub struct FindManyArgs<'a> {
    pub where_clause: &'a WhereClause,
    pub order_by: &'a [SortKey],
    pub skip: u64,
    pub take: u64,
    pub include: &'a IncludeMap,
}

impl<'a> FindManyArgs<'a> {
    pub fn from_request(request: &'a ListRequest) -> Self {
        Self {
            where_clause: &request.where_clause,
            order_by: &request.order_by,
            skip: request.pagination.skip,
            take: request.pagination.limit,
            include: &request.include,
        }
    }
}

/// A queryable set of records.
pub trait Collection: Send + Sync {
    fn find_many(&self, args: &FindManyArgs<'_>) -> impl Future<Output = StoreResult<Vec<Value>>> + Send;

    fn count(&self, where_clause: &WhereClause) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// Fetch one page of records plus the total used for pagination metadata.
pub async fn list<C: Collection>(collection: &C, request: &ListRequest) -> StoreResult<Paginated<Value>> {
    let args = FindManyArgs::from_request(request);
    let (data, total) = tokio::try_join!(
        collection.find_many(&args),
        collection.count(&request.where_clause)
    )?;

    tracing::debug!(
        returned = data.len(),
        total,
        skip = args.skip,
        take = args.take,
        "List query executed"
    );

    Ok(Paginated {
        data,
        pagination: PaginationMeta::new(&request.pagination, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{merge, ForcedScope, QueryResolver};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Records what the list routine asked for.
    #[derive(Default)]
    struct Recording {
        skip: AtomicU64,
        take: AtomicU64,
    }

    impl Collection for Recording {
        async fn find_many(&self, args: &FindManyArgs<'_>) -> StoreResult<Vec<Value>> {
            self.skip.store(args.skip, Ordering::SeqCst);
            self.take.store(args.take, Ordering::SeqCst);
            Ok(vec![serde_json::json!({ "id": 1 })])
        }

        async fn count(&self, _where_clause: &WhereClause) -> StoreResult<u64> {
            Ok(42)
        }
    }

    #[tokio::test]
    async fn test_list_forwards_window() {
        let descriptor = QueryResolver::default().resolve("page=3&limit=5");
        let request = merge(descriptor, ForcedScope::new());
        let collection = Recording::default();

        let page = list(&collection, &request).await.unwrap();

        assert_eq!(collection.skip.load(Ordering::SeqCst), 10);
        assert_eq!(collection.take.load(Ordering::SeqCst), 5);
        assert_eq!(page.data.len(), 1);
        assert_eq!(
            page.pagination,
            PaginationMeta { total_page: 9, current_page: 3, limit: 5, skip: 10 }
        );
    }
}
