use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use platform_authn::SessionVerifier;
use platform_authz::{AuthzError, PolicyTable};
use platform_db::DbPool;
use school::{
    ActionError, AttendanceBatch, AttendanceRecord, Dashboard, Page, RosterEntry,
    class_roster, dashboard,
    listing::{
        AttendanceFilter, AttendanceRow, LessonFilter, LessonRow, SortOrder, list_attendance,
        list_lessons,
    },
    replace_attendance,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::AppConfig,
    graphql::SchemaType,
    policy::{self, Caller},
};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub schema: SchemaType,
    pub policy: Arc<PolicyTable>,
    pub verifier: Arc<SessionVerifier>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "school server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/admin", get(dashboard_handler))
        .route("/teacher", get(dashboard_handler))
        .route("/student", get(dashboard_handler))
        .route("/parent", get(dashboard_handler))
        .route("/list/attendance", get(attendance_list_handler))
        .route("/list/lessons", get(lesson_list_handler))
        .route("/api/students/by-class/{class_id}", get(roster_handler))
        .route("/api/attendance/bulk", post(bulk_attendance_handler))
        .route("/graphql", post(graphql_handler))
        .layer(middleware::from_fn_with_state(state.clone(), policy::enforce))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

async fn graphql_handler(
    State(state): State<AppState>,
    caller: Option<Caller>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();
    if let Some(Caller(principal)) = caller {
        request = request.data(principal);
    }
    state.schema.execute(request).await.into()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn dashboard_handler(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> HttpResult<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(dashboard(&state.db, &principal, today).await?))
}

async fn roster_handler(
    State(state): State<AppState>,
    Caller(principal): Caller,
    class_id: Result<Path<i32>, PathRejection>,
) -> HttpResult<Json<Vec<RosterEntry>>> {
    let Path(class_id) =
        class_id.map_err(|_| HttpError::new(StatusCode::BAD_REQUEST, "invalid class id"))?;
    Ok(Json(class_roster(&state.db, &principal, class_id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkAttendanceRequest {
    attendance_records: Vec<AttendanceRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkAttendanceResponse {
    message: &'static str,
    records_created: u64,
}

async fn bulk_attendance_handler(
    State(state): State<AppState>,
    Caller(principal): Caller,
    body: Result<Json<BulkAttendanceRequest>, JsonRejection>,
) -> HttpResult<Json<BulkAttendanceResponse>> {
    let Json(body) = body.map_err(|rejection| {
        HttpError::new(StatusCode::BAD_REQUEST, &rejection.body_text())
    })?;
    let batch = AttendanceBatch::from_records(body.attendance_records)?;
    let records_created = replace_attendance(&state.db, &principal, batch).await?;
    Ok(Json(BulkAttendanceResponse {
        message: "Attendance saved",
        records_created,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceListQuery {
    page: Option<u64>,
    class_id: Option<i32>,
    student_id: Option<String>,
    search: Option<String>,
    sort: Option<SortOrder>,
}

async fn attendance_list_handler(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<AttendanceListQuery>,
) -> HttpResult<Json<Page<AttendanceRow>>> {
    let filter = AttendanceFilter {
        class_id: query.class_id,
        student_id: query.student_id,
        search: query.search,
    };
    let page = list_attendance(
        &state.db,
        &principal,
        &filter,
        query.page.unwrap_or(1),
        query.sort,
    )
    .await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LessonListQuery {
    page: Option<u64>,
    class_id: Option<i32>,
    teacher_id: Option<String>,
    search: Option<String>,
    sort: Option<SortOrder>,
}

async fn lesson_list_handler(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<LessonListQuery>,
) -> HttpResult<Json<Page<LessonRow>>> {
    let filter = LessonFilter {
        class_id: query.class_id,
        teacher_id: query.teacher_id,
        search: query.search,
    };
    let page = list_lessons(
        &state.db,
        &principal,
        &filter,
        query.page.unwrap_or(1),
        query.sort,
    )
    .await?;
    Ok(Json(page))
}

pub type HttpResult<T> = Result<T, HttpError>;

/// Error response rendered as `{"error": message}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }
}

impl From<ActionError> for HttpError {
    fn from(err: ActionError) -> Self {
        let status = match &err {
            ActionError::Authz(AuthzError::Unauthorized { .. }) => StatusCode::UNAUTHORIZED,
            ActionError::Authz(AuthzError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ActionError::NotFound { .. } => StatusCode::NOT_FOUND,
            ActionError::InvalidInput(_) | ActionError::ClassFull { .. } => {
                StatusCode::BAD_REQUEST
            }
            ActionError::Directory(_) | ActionError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_rejection() {
            tracing::warn!(class = err.class(), error = %err, "request rejected");
            Self::new(status, &err.to_string())
        } else {
            tracing::error!(class = err.class(), error = %err, "request failed");
            Self::new(status, "internal server error")
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
