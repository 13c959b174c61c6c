//! REST handlers for the record collections.
//!
//! List endpoints hand the raw query string to the resolver, merge it with
//! the endpoint's forced scope and run the generic list routine.

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::config::CollectionConfig;
use crate::http::response::{ApiError, ApiResponse};
use crate::http::server::AppState;
use crate::notifications::{Notification, ADHERENCE_UPDATED};
use crate::observability::metrics;
use crate::query::resolver::parse_populate;
use crate::query::{merge, FilterOp, ForcedScope, IncludeMap};
use crate::store;

/// Collection whose updates are pushed to WebSocket clients.
pub const ADHERENCE_LOGS: &str = "adherence-logs";

/// Record field naming the user an adherence update is addressed to.
const PATIENT_ID: &str = "patientId";

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let config = state.collection_config(&collection)?;
    let descriptor = state.resolver.resolve(query.as_deref().unwrap_or_default());
    let request = merge(descriptor, live_scope(config));

    let records = state.store.collection(&collection)?;
    let page = store::list(&records, &request).await?;
    metrics::record_list_query(&collection);

    Ok(ApiResponse::paginated(
        format!("{collection} retrieved successfully"),
        page,
    ))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<ApiResponse<Value>, ApiError> {
    let config = state.collection_config(&collection)?;
    let include = requested_include(&state, config, query.as_deref());

    let record = state.store.collection(&collection)?.get(&id, &include)?;
    Ok(ApiResponse::ok(format!("{collection} record retrieved successfully"), record))
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    state.collection_config(&collection)?;
    let record = state.store.collection(&collection)?.insert(body)?;

    tracing::info!(collection = %collection, id = ?record.get("id"), "Record created");
    Ok(ApiResponse::created(format!("{collection} record created successfully"), record))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    state.collection_config(&collection)?;
    let record = state.store.collection(&collection)?.update(&id, patch)?;

    if collection == ADHERENCE_LOGS {
        let user_id = record
            .get(PATIENT_ID)
            .and_then(Value::as_str)
            .map(str::to_string);
        state
            .hub
            .publish(Notification::new(ADHERENCE_UPDATED, user_id, record.clone()));
    }

    tracing::info!(collection = %collection, id = %id, "Record updated");
    Ok(ApiResponse::ok(format!("{collection} record updated successfully"), record))
}

/// Soft delete: the record is kept with `deletedAt` set.
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<ApiResponse<Value>, ApiError> {
    state.collection_config(&collection)?;
    let record = state.store.collection(&collection)?.soft_delete(&id)?;

    tracing::info!(collection = %collection, id = %id, "Record deleted");
    Ok(ApiResponse::ok(format!("{collection} record deleted successfully"), record))
}

/// Scope shared by every read: deleted records are invisible, configured
/// relations load on `includePopulate`.
fn live_scope(config: &CollectionConfig) -> ForcedScope {
    config
        .default_populate
        .iter()
        .flat_map(|entry| parse_populate(entry))
        .fold(
            ForcedScope::new().with_filter("deletedAt", FilterOp::Exists(false)),
            ForcedScope::with_default_populate,
        )
}

/// Relations requested by `populate` / `includePopulate` on a single-record read.
fn requested_include(state: &AppState, config: &CollectionConfig, query: Option<&str>) -> IncludeMap {
    let descriptor = state.resolver.resolve(query.unwrap_or_default());
    merge(descriptor, live_scope(config)).include
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Include;

    #[test]
    fn test_live_scope_hides_deleted_and_expands_defaults() {
        let config = CollectionConfig {
            default_populate: vec!["doctor:name|email".into(), "medication".into()],
        };
        let request = merge(
            crate::query::QueryResolver::default().resolve("includePopulate=true&deletedAt=x"),
            live_scope(&config),
        );

        assert_eq!(
            request.where_clause.scope.get("deletedAt"),
            Some(&FilterOp::Exists(false))
        );
        assert!(!request.where_clause.filter.contains_key("deletedAt"));
        assert_eq!(
            request.include.get("doctor"),
            Some(&Include::Select(vec!["name".into(), "email".into()]))
        );
        assert_eq!(request.include.get("medication"), Some(&Include::All));
    }

    #[test]
    fn test_defaults_need_include_populate() {
        let config = CollectionConfig {
            default_populate: vec!["doctor".into()],
        };
        let request = merge(
            crate::query::QueryResolver::default().resolve("status=ACTIVE"),
            live_scope(&config),
        );
        assert!(request.include.is_empty());
    }
}
