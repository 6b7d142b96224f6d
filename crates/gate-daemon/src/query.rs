use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use gate_db::{GuardError, JsonRow, ReadOnlyQuery, Statement};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::server::{ApiError, AppState, ErrorBody};

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryBody {
    /// Statement text; must start with `SELECT`.
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<JsonRow>,
    pub count: usize,
}

/// Runs caller-authored SQL after the read-only prefix check. The text is
/// sent exactly as received; nothing is bound or rewritten.
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryBody,
    responses(
        (status = 200, description = "Query rows", body = QueryResponse),
        (status = 400, description = "Missing query or not a SELECT", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn run_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let text = body.query.ok_or(GuardError::EmptyQuery)?;
    let query = ReadOnlyQuery::parse(&text)?;

    info!(length = text.len(), "running read-only query");
    let data = state.executor.fetch_all(&Statement::read_only(query)).await?;
    Ok(Json(QueryResponse {
        success: true,
        count: data.len(),
        data,
    }))
}
