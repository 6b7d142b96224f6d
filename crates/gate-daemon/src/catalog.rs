use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use gate_db::{
    count_from_rows, first_column_strings,
    guard::{coerce_count, DEFAULT_PAGE_LIMIT},
    ColumnDescriptor, Identifier, JsonRow, Page, Statement, TableRef,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    extract::{ApiPath, ApiQuery},
    server::{ApiError, AppState, ErrorBody, GatewayMode},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Rows per page; non-numeric input falls back to 100.
    #[serde(default)]
    pub limit: Option<String>,
    /// Rows to skip; non-numeric input falls back to 0.
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Maximum rows; non-numeric input falls back to 100.
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub database: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabasesResponse {
    pub success: bool,
    pub databases: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TablesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub tables: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ColumnResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

impl From<ColumnDescriptor> for ColumnResponse {
    fn from(column: ColumnDescriptor) -> Self {
        Self {
            name: column.name,
            data_type: column.data_type,
            nullable: column.nullable,
            key: column.key,
            default: column.default,
            extra: column.extra,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StructureResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub table: String,
    pub columns: Vec<ColumnResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TableDataResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub table: String,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<JsonRow>,
    pub count: usize,
    /// Exact `COUNT(*)`, taken in a separate round-trip from the page.
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShortcutResponse {
    pub success: bool,
    pub table: String,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<JsonRow>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Available operations", body = ApiInfo))
)]
pub async fn api_info(State(state): State<Arc<AppState>>) -> Json<ApiInfo> {
    Json(ApiInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.mode.as_str().to_string(),
        database: state.mode.default_database().map(str::to_string),
        endpoints: endpoints(&state.mode),
    })
}

fn endpoints(mode: &GatewayMode) -> Vec<EndpointInfo> {
    let mut listed = vec![
        ("GET", "/", "API description"),
        ("GET", "/health", "Database connectivity check"),
        ("POST", "/query", "Run a read-only SELECT; body {\"query\": \"...\"}"),
        ("GET", "/openapi.json", "OpenAPI document"),
    ];
    match mode {
        GatewayMode::MultiDatabase => listed.extend([
            ("GET", "/databases", "List databases"),
            ("GET", "/database/:db/tables", "List tables in a database"),
            (
                "GET",
                "/database/:db/table/:table",
                "Paged table rows (?limit=100&offset=0)",
            ),
            (
                "GET",
                "/database/:db/table/:table/structure",
                "Column structure of a table",
            ),
        ]),
        GatewayMode::SingleDatabase(_) => listed.extend([
            ("GET", "/tables", "List tables"),
            ("GET", "/table/:table", "Paged table rows (?limit=100&offset=0)"),
            ("GET", "/table/:table/structure", "Column structure of a table"),
            ("GET", "/deals", "Rows of the deals table (?limit=100)"),
            ("GET", "/companies", "Rows of the companies table (?limit=100)"),
            ("GET", "/contacts", "Rows of the contacts table (?limit=100)"),
            ("GET", "/leads", "Rows of the leads table (?limit=100)"),
        ]),
    }

    listed
        .into_iter()
        .map(|(method, path, description)| EndpointInfo {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = Utc::now().to_rfc3339();
    match state.executor.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                success: true,
                status: "ok".into(),
                database: "connected".into(),
                timestamp,
                error: None,
            }),
        ),
        Err(error) => {
            warn!(%error, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    success: false,
                    status: "error".into(),
                    database: "disconnected".into(),
                    timestamp,
                    error: Some(error.to_string()),
                }),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/databases",
    responses(
        (status = 200, description = "Databases visible to the configured user", body = DatabasesResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_databases(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatabasesResponse>, ApiError> {
    let rows = state
        .executor
        .fetch_all(&Statement::list_databases())
        .await?;
    let databases = first_column_strings(&rows);
    Ok(Json(DatabasesResponse {
        success: true,
        count: databases.len(),
        databases,
    }))
}

#[utoipa::path(
    get,
    path = "/database/{db}/tables",
    params(("db" = String, Path, description = "Database name")),
    responses(
        (status = 200, description = "Tables in the database", body = TablesResponse),
        (status = 400, description = "Invalid database name", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_database_tables(
    State(state): State<Arc<AppState>>,
    ApiPath(db): ApiPath<String>,
) -> Result<Json<TablesResponse>, ApiError> {
    let database = Identifier::parse(&db)?;
    fetch_tables(&state, Some(database)).await
}

#[utoipa::path(
    get,
    path = "/tables",
    responses(
        (status = 200, description = "Tables in the configured database", body = TablesResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_tables(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TablesResponse>, ApiError> {
    fetch_tables(&state, None).await
}

async fn fetch_tables(
    state: &AppState,
    database: Option<Identifier>,
) -> Result<Json<TablesResponse>, ApiError> {
    let rows = state
        .executor
        .fetch_all(&Statement::list_tables(database.as_ref()))
        .await?;
    let tables = first_column_strings(&rows);
    Ok(Json(TablesResponse {
        success: true,
        database: response_database(state, database.as_ref()),
        count: tables.len(),
        tables,
    }))
}

#[utoipa::path(
    get,
    path = "/database/{db}/table/{table}/structure",
    params(
        ("db" = String, Path, description = "Database name"),
        ("table" = String, Path, description = "Table name")
    ),
    responses(
        (status = 200, description = "Column structure", body = StructureResponse),
        (status = 400, description = "Invalid identifier", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn database_table_structure(
    State(state): State<Arc<AppState>>,
    ApiPath((db, table)): ApiPath<(String, String)>,
) -> Result<Json<StructureResponse>, ApiError> {
    let table = TableRef::parse(Some(&db), &table)?;
    fetch_structure(&state, table).await
}

#[utoipa::path(
    get,
    path = "/table/{table}/structure",
    params(("table" = String, Path, description = "Table name")),
    responses(
        (status = 200, description = "Column structure", body = StructureResponse),
        (status = 400, description = "Invalid identifier", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn table_structure(
    State(state): State<Arc<AppState>>,
    ApiPath(table): ApiPath<String>,
) -> Result<Json<StructureResponse>, ApiError> {
    let table = TableRef::parse(None, &table)?;
    fetch_structure(&state, table).await
}

async fn fetch_structure(
    state: &AppState,
    table: TableRef,
) -> Result<Json<StructureResponse>, ApiError> {
    debug!(table = %table.qualified(), "describing table");
    let rows = state
        .executor
        .fetch_all(&Statement::describe_table(&table))
        .await?;
    let columns: Vec<ColumnResponse> = rows
        .iter()
        .map(ColumnDescriptor::from_show_columns)
        .map(ColumnResponse::from)
        .collect();
    Ok(Json(StructureResponse {
        success: true,
        database: response_database(state, table.database.as_ref()),
        table: table.table.as_str().to_owned(),
        count: columns.len(),
        columns,
    }))
}

#[utoipa::path(
    get,
    path = "/database/{db}/table/{table}",
    params(
        ("db" = String, Path, description = "Database name"),
        ("table" = String, Path, description = "Table name"),
        PageQuery
    ),
    responses(
        (status = 200, description = "One page of rows plus the table total", body = TableDataResponse),
        (status = 400, description = "Invalid identifier", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn database_table_data(
    State(state): State<Arc<AppState>>,
    ApiPath((db, table)): ApiPath<(String, String)>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<TableDataResponse>, ApiError> {
    let table = TableRef::parse(Some(&db), &table)?;
    fetch_page(&state, table, query).await
}

#[utoipa::path(
    get,
    path = "/table/{table}",
    params(
        ("table" = String, Path, description = "Table name"),
        PageQuery
    ),
    responses(
        (status = 200, description = "One page of rows plus the table total", body = TableDataResponse),
        (status = 400, description = "Invalid identifier", body = ErrorBody),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn table_data(
    State(state): State<Arc<AppState>>,
    ApiPath(table): ApiPath<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<TableDataResponse>, ApiError> {
    let table = TableRef::parse(None, &table)?;
    fetch_page(&state, table, query).await
}

/// Page and total are two independent round-trips without a shared
/// snapshot; concurrent writers can make them disagree.
async fn fetch_page(
    state: &AppState,
    table: TableRef,
    query: PageQuery,
) -> Result<Json<TableDataResponse>, ApiError> {
    let page = Page::from_raw(query.limit.as_deref(), query.offset.as_deref());
    info!(
        table = %table.qualified(),
        limit = page.limit,
        offset = page.offset,
        "fetching table page"
    );

    let data = state
        .executor
        .fetch_all(&Statement::select_page(&table, page))
        .await?;
    let total = count_from_rows(
        &state
            .executor
            .fetch_all(&Statement::count_rows(&table))
            .await?,
    );

    Ok(Json(TableDataResponse {
        success: true,
        database: response_database(state, table.database.as_ref()),
        table: table.table.as_str().to_owned(),
        count: data.len(),
        data,
        total,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[utoipa::path(
    get,
    path = "/deals",
    params(LimitQuery),
    responses(
        (status = 200, description = "Rows of the deals table", body = ShortcutResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<ShortcutResponse>, ApiError> {
    fetch_fixed_table(&state, "deals", query).await
}

#[utoipa::path(
    get,
    path = "/companies",
    params(LimitQuery),
    responses(
        (status = 200, description = "Rows of the companies table", body = ShortcutResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<ShortcutResponse>, ApiError> {
    fetch_fixed_table(&state, "companies", query).await
}

#[utoipa::path(
    get,
    path = "/contacts",
    params(LimitQuery),
    responses(
        (status = 200, description = "Rows of the contacts table", body = ShortcutResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<ShortcutResponse>, ApiError> {
    fetch_fixed_table(&state, "contacts", query).await
}

#[utoipa::path(
    get,
    path = "/leads",
    params(LimitQuery),
    responses(
        (status = 200, description = "Rows of the leads table", body = ShortcutResponse),
        (status = 500, description = "Database error", body = ErrorBody)
    )
)]
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<ShortcutResponse>, ApiError> {
    fetch_fixed_table(&state, "leads", query).await
}

async fn fetch_fixed_table(
    state: &AppState,
    name: &str,
    query: LimitQuery,
) -> Result<Json<ShortcutResponse>, ApiError> {
    let table = TableRef::parse(None, name)?;
    let limit = coerce_count(query.limit.as_deref(), DEFAULT_PAGE_LIMIT);
    let data = state
        .executor
        .fetch_all(&Statement::select_limited(&table, limit))
        .await?;
    Ok(Json(ShortcutResponse {
        success: true,
        table: name.to_string(),
        count: data.len(),
        data,
    }))
}

/// Name reported back to the caller: the requested schema, or the session
/// default in single-database mode.
fn response_database(state: &AppState, requested: Option<&Identifier>) -> Option<String> {
    requested
        .map(Identifier::to_string)
        .or_else(|| state.mode.default_database().map(str::to_string))
}
