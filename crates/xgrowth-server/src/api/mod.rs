mod candidates;
mod runs;
mod stats;
mod unfollows;
mod whitelist;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use xgrowth_core::AppConfig;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &xgrowth_db::DbError) -> ApiError {
    if matches!(error, xgrowth_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/stats", get(stats::get_stats))
        .route("/api/v1/candidates", get(candidates::list_candidates))
        .route("/api/v1/unfollows", get(unfollows::list_unfollows))
        .route("/api/v1/runs", get(runs::list_runs))
        .route("/api/v1/runs/{batch_id}", get(runs::get_run))
        .route("/api/v1/whitelist", get(whitelist::list_whitelist))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(
                    |request: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    },
                ))
                .layer(build_cors())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match xgrowth_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id.0,
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id.0,
                ),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tower::ServiceExt;
    use xgrowth_core::{CleanerConfig, Environment};

    fn test_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            database_url: "postgres://example".to_string(),
            env: Environment::Test,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7860),
            log_level: "info".to_string(),
            x_access_token: None,
            x_user_id: None,
            x_api_base_url: "https://api.twitter.com/2/".to_string(),
            db_max_connections: 5,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: "xgrowth-test".to_string(),
            max_retries: 0,
            retry_backoff_base_ms: 0,
            refresh_cron: "0 0 3 * * *".to_string(),
            cleaner: CleanerConfig::default(),
        })
    }

    fn open_app(pool: PgPool) -> Router {
        let auth = AuthState::from_keys("", true).expect("auth");
        build_app(
            AppState {
                pool,
                config: test_config(),
            },
            auth,
            default_rate_limit_state(),
        )
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).expect("json parse");
        (status, json)
    }

    async fn seed_account(
        pool: &PgPool,
        user_id: &str,
        days_inactive: Option<i32>,
        score: Option<i32>,
    ) {
        sqlx::query(
            "INSERT INTO accounts \
             (user_id, username, follower_count, days_inactive, unfollow_score, last_checked_date) \
             VALUES ($1, $2, 40, $3, $4, NOW())",
        )
        .bind(user_id)
        .bind(format!("user_{user_id}"))
        .bind(days_inactive)
        .bind(score)
        .execute(pool)
        .await
        .expect("seed account");
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_codes_map_to_status() {
        let cases = [
            ("bad_request", StatusCode::BAD_REQUEST),
            ("not_found", StatusCode::NOT_FOUND),
            ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            let response = ApiError::new("req-1", code, "msg").into_response();
            assert_eq!(response.status(), status, "code {code}");
        }
    }

    #[test]
    fn db_not_found_maps_to_not_found() {
        let err = map_db_error("req-2".to_string(), &xgrowth_db::DbError::NotFound);
        assert_eq!(err.error.code, "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_reports_ok_and_echoes_request_id(pool: PgPool) {
        let response = open_app(pool)
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "req-health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-request-id").map(HeaderValue::as_bytes),
            Some(&b"req-health"[..])
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["meta"]["request_id"], "req-health");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn protected_routes_require_bearer_when_keys_configured(pool: PgPool) {
        let auth = AuthState::from_keys("secret-key", false).expect("auth");
        let app = build_app(
            AppState {
                pool,
                config: test_config(),
            },
            auth,
            default_rate_limit_state(),
        );

        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stats")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/stats")
                    .header("authorization", "Bearer secret-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn rate_limit_rejects_after_window_is_spent(pool: PgPool) {
        let auth = AuthState::from_keys("", true).expect("auth");
        let app = build_app(
            AppState {
                pool,
                config: test_config(),
            },
            auth,
            RateLimitState::new(1, Duration::from_secs(60)),
        );

        let (first, _) = get_json(app.clone(), "/api/v1/whitelist").await;
        let (second, body) = get_json(app, "/api/v1/whitelist").await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "rate_limited");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn stats_counts_brackets(pool: PgPool) {
        seed_account(&pool, "1", Some(400), Some(170)).await;
        seed_account(&pool, "2", Some(10), Some(0)).await;
        seed_account(&pool, "3", None, None).await;

        let (status, json) = get_json(open_app(pool), "/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["total_following"], 3);
        assert_eq!(json["data"]["dead_1year"], 1);
        assert_eq!(json["data"]["active"], 1);
        assert_eq!(json["data"]["unchecked"], 1);
        assert_eq!(json["data"]["unfollow_candidates"], 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn candidates_exclude_whitelisted_and_carry_reason(pool: PgPool) {
        seed_account(&pool, "1", Some(400), Some(170)).await;
        seed_account(&pool, "2", Some(200), Some(130)).await;
        sqlx::query("INSERT INTO whitelist (user_id, username) VALUES ('2', 'user_2')")
            .execute(&pool)
            .await
            .expect("seed whitelist");

        let (status, json) = get_json(open_app(pool), "/api/v1/candidates?limit=10").await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["user_id"], "1");
        assert_eq!(data[0]["unfollow_score"], 170);
        assert_eq!(data[0]["reason"], "Inactive for 400 days (score: 170)");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_run_is_not_found(pool: PgPool) {
        let uri = format!("/api/v1/runs/{}", uuid::Uuid::new_v4());
        let (status, json) = get_json(open_app(pool), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn malformed_batch_id_is_bad_request(pool: PgPool) {
        let (status, _) = get_json(open_app(pool.clone()), "/api/v1/runs/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(open_app(pool), "/api/v1/unfollows?batch_id=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
