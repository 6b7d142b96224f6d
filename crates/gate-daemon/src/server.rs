use std::{
    env,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gate_db::{
    ConnectSettings, Database, ExecutionError, GuardError, SqlExecutor, DEFAULT_POOL_SIZE,
    DEFAULT_STATEMENT_TIMEOUT,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::{catalog, query};

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.connect)
        .await
        .context("failed to open database")?;
    info!(
        host = %config.connect.host,
        port = config.connect.port,
        pool_size = config.connect.pool_size,
        mode = config.mode().as_str(),
        "connected to MySQL"
    );

    let state = Arc::new(AppState::new(Arc::new(db.clone()), config.mode()));

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listen socket")?;

    info!(addr = %config.listen_addr, "gate-daemon listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server exited")?;

    db.close().await;
    info!("connection pool closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Routes shared by both modes plus the mode's own table routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(catalog::api_info))
        .route("/health", get(catalog::health))
        .route("/query", post(query::run_query))
        .route("/openapi.json", get(openapi_json));

    let router = match state.mode {
        GatewayMode::MultiDatabase => router
            .route("/databases", get(catalog::list_databases))
            .route("/database/:db/tables", get(catalog::list_database_tables))
            .route("/database/:db/table/:table", get(catalog::database_table_data))
            .route(
                "/database/:db/table/:table/structure",
                get(catalog::database_table_structure),
            ),
        GatewayMode::SingleDatabase(_) => router
            .route("/tables", get(catalog::list_tables))
            .route("/table/:table", get(catalog::table_data))
            .route("/table/:table/structure", get(catalog::table_structure))
            .route("/deals", get(catalog::list_deals))
            .route("/companies", get(catalog::list_companies))
            .route("/contacts", get(catalog::list_contacts))
            .route("/leads", get(catalog::list_leads)),
    };

    router.fallback(route_not_found).with_state(state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, format!("no route for {}", uri.path()))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(docs::ApiDoc::openapi())
}

/// Whether requests name the database or the session default is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMode {
    MultiDatabase,
    SingleDatabase(String),
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::MultiDatabase => "multi-database",
            GatewayMode::SingleDatabase(_) => "single-database",
        }
    }

    pub fn default_database(&self) -> Option<&str> {
        match self {
            GatewayMode::MultiDatabase => None,
            GatewayMode::SingleDatabase(name) => Some(name),
        }
    }
}

pub struct AppState {
    pub executor: Arc<dyn SqlExecutor>,
    pub mode: GatewayMode,
}

impl AppState {
    pub fn new(executor: Arc<dyn SqlExecutor>, mode: GatewayMode) -> Self {
        Self { executor, mode }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub connect: ConnectSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let listen_host: IpAddr = parse_or(
            get("GATE_LISTEN_HOST"),
            "GATE_LISTEN_HOST",
            IpAddr::from([0, 0, 0, 0]),
        )?;
        let listen_port: u16 = parse_or(get("PORT"), "PORT", 3000)?;

        let pool_size: u32 =
            parse_or(get("GATE_POOL_SIZE"), "GATE_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let timeout_secs: u64 = parse_or(
            get("GATE_QUERY_TIMEOUT_SECS"),
            "GATE_QUERY_TIMEOUT_SECS",
            DEFAULT_STATEMENT_TIMEOUT.as_secs(),
        )?;

        let connect = ConnectSettings {
            host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(get("DB_PORT"), "DB_PORT", 3306)?,
            user: get("DB_USER").unwrap_or_else(|| "root".to_string()),
            // Passwords are taken as-is, surrounding whitespace included.
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: get("DB_NAME"),
            pool_size: pool_size.max(1),
            statement_timeout: Duration::from_secs(timeout_secs.max(1)),
        };

        Ok(Self {
            listen_addr: SocketAddr::new(listen_host, listen_port),
            connect,
        })
    }

    pub fn mode(&self) -> GatewayMode {
        match &self.connect.database {
            Some(name) => GatewayMode::SingleDatabase(name.clone()),
            None => GatewayMode::MultiDatabase,
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid {key}: '{value}'")),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "api error");
        } else {
            warn!(status = %self.status, message = %self.message, "request rejected");
        }
        let body = Json(ErrorBody {
            success: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

pub mod docs {
    use utoipa::OpenApi;

    use super::ErrorBody;
    use crate::{catalog, query};

    #[derive(OpenApi)]
    #[openapi(
        info(title = "Gate SQL Gateway API", version = "0.1.0"),
        paths(
            catalog::api_info,
            catalog::health,
            catalog::list_databases,
            catalog::list_database_tables,
            catalog::database_table_data,
            catalog::database_table_structure,
            catalog::list_tables,
            catalog::table_data,
            catalog::table_structure,
            catalog::list_deals,
            catalog::list_companies,
            catalog::list_contacts,
            catalog::list_leads,
            query::run_query
        ),
        components(schemas(
            ErrorBody,
            catalog::ApiInfo,
            catalog::EndpointInfo,
            catalog::HealthResponse,
            catalog::DatabasesResponse,
            catalog::TablesResponse,
            catalog::ColumnResponse,
            catalog::StructureResponse,
            catalog::TableDataResponse,
            catalog::ShortcutResponse,
            query::QueryBody,
            query::QueryResponse
        ))
    )]
    pub struct ApiDoc;
}
