use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::{HeaderName, HeaderValue},
    routing::get,
};
use chrono::{DateTime, Utc};
use entity::employees;
use platform_api::{ApiError, ApiResult};
use platform_db::{EmployeeStore, Lookup};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: EmployeeStore,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: EmployeeStore, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }
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

    info!(%config.addr, "employee service listening");
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
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(allow_origin)
}

/// Served as JSON at [`OPENAPI_PATH`] and browsable under `/swagger`.
#[derive(OpenApi)]
#[openapi(
    paths(
        list_employees,
        get_employee,
        list_employees_by_department,
        health_handler
    ),
    components(schemas(employees::Model, HealthResponse)),
    tags(
        (name = "employees", description = "Read-only employee directory"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

pub const OPENAPI_PATH: &str = "/swagger/v1/swagger.json";

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/employees", get(list_employees))
        .route("/api/employees/health", get(health_handler))
        .route(
            "/api/employees/department/{department}",
            get(list_employees_by_department),
        )
        .route("/api/employees/{id}", get(get_employee))
        .merge(SwaggerUi::new("/swagger").url(OPENAPI_PATH, ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/employees",
    tag = "employees",
    responses(
        (status = 200, description = "All employees", body = [employees::Model]),
        (status = 500, description = "Store failure", body = String)
    )
)]
async fn list_employees(State(state): State<AppState>) -> ApiResult<Json<Vec<employees::Model>>> {
    info!("fetching all employees");
    let employees = state
        .store
        .list_all()
        .await
        .inspect_err(|err| error!(error = %err, "error occurred while fetching employees"))?;
    info!(count = employees.len(), "retrieved employees");
    Ok(Json(employees))
}

#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    tag = "employees",
    params(("id" = i32, Path, description = "Employee id")),
    responses(
        (status = 200, description = "The employee", body = employees::Model),
        (status = 400, description = "Id is not an integer", body = String),
        (status = 404, description = "No employee with this id"),
        (status = 500, description = "Store failure", body = String)
    )
)]
async fn get_employee(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<employees::Model>> {
    let Path(id) = id.map_err(|rejection| ApiError::InvalidInput(rejection.body_text()))?;
    info!(id, "fetching employee");
    let lookup = state.store.get_by_id(id).await.inspect_err(
        |err| error!(error = %err, id, "error occurred while fetching employee"),
    )?;
    match lookup {
        Lookup::Found(employee) => Ok(Json(employee)),
        Lookup::NotFound => {
            warn!(id, "employee not found");
            Err(ApiError::NotFound)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/employees/department/{department}",
    tag = "employees",
    params(("department" = String, Path, description = "Department name, any case")),
    responses(
        (status = 200, description = "Matching employees, possibly none", body = [employees::Model]),
        (status = 500, description = "Store failure", body = String)
    )
)]
async fn list_employees_by_department(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> ApiResult<Json<Vec<employees::Model>>> {
    info!(%department, "fetching employees by department");
    let employees = state
        .store
        .list_by_department(&department)
        .await
        .inspect_err(|err| {
            error!(error = %err, %department, "error occurred while fetching employees by department")
        })?;
    info!(count = employees.len(), %department, "retrieved employees by department");
    Ok(Json(employees))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Healthy".to_string(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    #[schema(example = "Healthy")]
    status: String,
    #[schema(value_type = String, format = DateTime)]
    timestamp: DateTime<Utc>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received CTRL+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use platform_api::INTERNAL_ERROR_MESSAGE;
    use platform_db::{DatabaseSettings, DbPool, seed_employees};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn memory_pool() -> DbPool {
        let settings = DatabaseSettings::new("sqlite::memory:").with_max_connections(1);
        platform_db::connect(&settings).await.unwrap()
    }

    fn router_for(pool: DbPool) -> Router {
        build_router(AppState::new(
            EmployeeStore::new(pool),
            Arc::new(AppConfig::default()),
        ))
    }

    async fn seeded_router() -> Router {
        let pool = memory_pool().await;
        platform_db::initialize(&pool).await.unwrap();
        router_for(pool)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, body) = get(router, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn ids(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|employee| employee["id"].as_i64().unwrap())
            .collect()
    }

    fn assert_healthy(body: &Value) {
        assert_eq!(body["status"], "Healthy");
        let stamp = DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).unwrap();
        let drift = Utc::now().signed_duration_since(stamp.with_timezone(&Utc));
        assert!(drift.num_seconds().abs() < 5, "timestamp drifted {drift}");
    }

    #[tokio::test]
    async fn lists_every_seeded_employee() {
        let router = seeded_router().await;
        let (status, body) = get_json(&router, "/api/employees").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::to_value(seed_employees()).unwrap());
        assert_eq!(body[6]["isActive"], json!(false));
        assert_eq!(body[0]["hireDate"], json!("2022-01-15T00:00:00Z"));
        assert_eq!(body[0]["salary"].as_f64(), Some(75000.0));
    }

    #[tokio::test]
    async fn fetches_each_seeded_employee_by_id() {
        let router = seeded_router().await;
        for id in 1..=8 {
            let (status, body) = get_json(&router, &format!("/api/employees/{id}")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], json!(id));
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_with_empty_body() {
        let router = seeded_router().await;
        let (status, body) = get(&router, "/api/employees/999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let router = seeded_router().await;
        let (status, _) = get(&router, "/api/employees/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn department_filter_ignores_case() {
        let router = seeded_router().await;
        let (status, lower) = get_json(&router, "/api/employees/department/engineering").await;
        assert_eq!(status, StatusCode::OK);
        let (status, title) = get_json(&router, "/api/employees/department/Engineering").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lower, title);
        assert_eq!(ids(&lower), vec![1, 3, 6]);

        let (_, shouting) = get_json(&router, "/api/employees/department/hR").await;
        assert_eq!(ids(&shouting), vec![4]);
    }

    #[tokio::test]
    async fn unknown_department_is_empty_success() {
        let router = seeded_router().await;
        let (status, body) = get_json(&router, "/api/employees/department/nonexistent").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn health_endpoints_report_healthy() {
        let router = seeded_router().await;
        for uri in ["/health", "/api/employees/health"] {
            let (status, body) = get_json(&router, uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_healthy(&body);
        }
    }

    #[tokio::test]
    async fn store_failures_are_masked_as_internal_errors() {
        // No initialize: the employees table does not exist.
        let router = router_for(memory_pool().await);
        for uri in [
            "/api/employees",
            "/api/employees/1",
            "/api/employees/department/engineering",
        ] {
            let (status, body) = get(&router, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(String::from_utf8(body).unwrap(), INTERNAL_ERROR_MESSAGE);
        }

        let (status, body) = get_json(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_healthy(&body);
    }

    #[tokio::test]
    async fn serves_openapi_document() {
        let router = seeded_router().await;
        let (status, body) = get_json(&router, OPENAPI_PATH).await;
        assert_eq!(status, StatusCode::OK);
        for path in [
            "/api/employees",
            "/api/employees/{id}",
            "/api/employees/department/{department}",
            "/health",
        ] {
            assert!(body["paths"].get(path).is_some(), "{path} undocumented");
        }
        let employee = &body["components"]["schemas"]["Employee"]["properties"];
        assert!(employee.get("hireDate").is_some());
        assert!(employee.get("isActive").is_some());
    }

    #[tokio::test]
    async fn responses_carry_cors_and_request_id_headers() {
        let router = seeded_router().await;
        let request = Request::builder()
            .uri("/api/employees/1")
            .header(header::ORIGIN, "http://elsewhere.test")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.contains_key("x-request-id"));
    }
}
