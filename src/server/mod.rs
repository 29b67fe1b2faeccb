//! HTTP surface
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | service name and version (plus host in debug mode) |
//! | `GET /options` | every cached version and its option descriptors |
//! | `GET /versions` | the `BuildVersion` selector descriptor |
//! | `POST /build` | build firmware and return the artifact |

pub mod response;

pub use response::{ApiError, BuildDiagnostics, BuildSuccess};

use crate::build::BuildPipeline;
use crate::catalog::OptionsCache;
use crate::error::{BuildBotError, BuildBotResult};
use crate::process::{Invocation, ProcessRunner};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, info_span, Instrument};

/// Name reported by `GET /`
pub const APP_NAME: &str = "BrewTroller Build Bot";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub cache: Arc<OptionsCache>,
    pub pipeline: BuildPipeline,
    pub runner: Arc<dyn ProcessRunner>,
    pub debug: bool,
    pub max_request_bytes: usize,
}

pub type SharedState = Arc<AppState>;

// ── Router ────────────────────────────────────────────────────────────

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/options", get(options))
        .route("/versions", get(versions))
        .route("/build", post(build))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: CancellationToken,
) -> BuildBotResult<()> {
    let app = build_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| BuildBotError::io("serving HTTP", e))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn home(State(state): State<SharedState>) -> Json<BTreeMap<&'static str, String>> {
    let mut info = BTreeMap::new();
    info.insert("app", APP_NAME.to_string());
    info.insert("version", env!("CARGO_PKG_VERSION").to_string());
    if state.debug {
        info.insert("host", host_description(state.runner.as_ref()).await);
    }
    Json(info)
}

/// `uname -a`, or the compile-time platform if that is unavailable
async fn host_description(runner: &dyn ProcessRunner) -> String {
    let invocation = Invocation::new("uname", std::env::temp_dir())
        .arg("-a")
        .timeout(Duration::from_secs(5));

    match runner.run(&invocation).await {
        Ok(output) if output.success() => output.stdout.trim().to_string(),
        _ => format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
    }
}

async fn options(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.cache.snapshot();
    serde_json::to_value(&*snapshot)
        .map(Json)
        .map_err(|e| ApiError::new(e.into(), state.debug))
}

async fn versions(State(state): State<SharedState>) -> Json<Value> {
    Json(state.cache.snapshot().version_selector())
}

async fn build(State(state): State<SharedState>, request: Request) -> Response {
    let caller = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let span = info_span!("build", %caller);

    async move {
        let body = match axum::body::to_bytes(request.into_body(), state.max_request_bytes).await {
            Ok(body) => body,
            Err(e) => {
                let err = BuildBotError::RequestBody(e.to_string());
                info!("Rejected build request: {}", err);
                return ApiError::new(err, state.debug).into_response();
            }
        };

        match state.pipeline.execute(&caller, &body).await {
            Ok(outcome) => Json(BuildSuccess::new(outcome, state.debug)).into_response(),
            Err(e) => {
                if e.is_client_error() {
                    info!("Rejected build request: {}", e);
                } else {
                    error!("Build failed: {}", e);
                }
                ApiError::new(e, state.debug).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{OptionDescriptor, OptionsManifest, SourceMirror};
    use crate::config::BuildConfig;
    use crate::git::Git;
    use crate::process::scripted::{FakeFirmware, FAKE_ARTIFACT};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        root: TempDir,
        router: Router,
    }

    fn test_app(firmware: FakeFirmware, debug: bool) -> TestApp {
        let root = TempDir::new().unwrap();
        let mirror = root.path().join("mirror");
        std::fs::create_dir_all(&mirror).unwrap();

        let descriptor: OptionDescriptor = serde_json::from_str(r#"{"name":"TEMP_UNIT"}"#).unwrap();
        let manifest: OptionsManifest = [("v1.0.0".to_string(), vec![descriptor])]
            .into_iter()
            .collect();
        let cache = Arc::new(OptionsCache::new());
        cache.replace(manifest);

        let runner: Arc<dyn ProcessRunner> = Arc::new(firmware.into_runner());
        let config = BuildConfig {
            workspace_root: Some(root.path().join("work")),
            ..Default::default()
        };
        let pipeline = BuildPipeline::new(
            config,
            cache.clone(),
            Arc::new(SourceMirror::new(mirror)),
            Git::new(runner.clone(), Duration::from_secs(5)),
            runner.clone(),
        );
        let state = Arc::new(AppState {
            cache,
            pipeline,
            runner,
            debug,
            max_request_bytes: 4096,
        });

        TestApp {
            root,
            router: build_router(state),
        }
    }

    fn firmware() -> FakeFirmware {
        FakeFirmware::default().with_tag("v1.0.0", Some(r#"[{"name":"TEMP_UNIT"}]"#))
    }

    fn post_build(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/build")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderValue, Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let cors = resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(""));
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap();
        (status, cors, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    const REQUEST: &str = r#"{"board":"mega2560","BuildVersion":"v1.0.0","TEMP_UNIT":"F"}"#;

    #[tokio::test]
    async fn home_reports_app_and_version() {
        let app = test_app(firmware(), false);
        let (status, cors, json) = send(&app.router, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cors, "*");
        assert_eq!(json["app"], APP_NAME);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json.get("host").is_none());
    }

    #[tokio::test]
    async fn home_includes_host_in_debug() {
        let app = test_app(firmware(), true);
        let (_, _, json) = send(&app.router, get("/")).await;
        assert_eq!(json["host"], "Linux fakehost 6.1.0 x86_64");
    }

    #[tokio::test]
    async fn options_returns_cache_snapshot() {
        let app = test_app(firmware(), false);
        let (status, _, json) = send(&app.router, get("/options")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"v1.0.0": [{"name": "TEMP_UNIT"}]}));
    }

    #[tokio::test]
    async fn versions_returns_selector() {
        let app = test_app(firmware(), false);
        let (status, _, json) = send(&app.router, get("/versions")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["id"], "BuildVersion");
        assert_eq!(json[0]["options"][0]["name"], "v1.0.0");
    }

    #[tokio::test]
    async fn build_returns_base64_artifact() {
        let app = test_app(firmware(), false);
        let (status, cors, json) = send(&app.router, post_build(REQUEST)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cors, "*");
        let binary = base64::engine::general_purpose::STANDARD
            .decode(json["binary"].as_str().unwrap())
            .unwrap();
        assert_eq!(binary, FAKE_ARTIFACT);
        assert_eq!(json["encoding"], "base64");
        assert!(json.get("buildLocation").is_none());
        assert_eq!(std::fs::read_dir(app.root.path().join("work")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn build_debug_names_workspace_after_caller() {
        let app = test_app(firmware(), true);
        let mut req = post_build(REQUEST);
        let addr: SocketAddr = "192.168.1.20:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));

        let (status, _, json) = send(&app.router, req).await;

        assert_eq!(status, StatusCode::OK);
        let location = json["buildLocation"].as_str().unwrap();
        assert!(location.contains("192_168_1_20-51234-"), "{location}");
        assert!(json["cmake-output"].as_str().unwrap().contains("Configuring done"));
        assert_eq!(json["reqDat"], REQUEST);
        assert!(json["make-output"].as_str().unwrap().contains("Built target"));
    }

    #[tokio::test]
    async fn unknown_version_is_bad_request() {
        let body = r#"{"board":"mega2560","BuildVersion":"v9.9.9","TEMP_UNIT":"F"}"#;

        let app = test_app(firmware(), false);
        let (status, _, json) = send(&app.router, post_build(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"code": "400", "message": "Bad Request"}));

        let app = test_app(firmware(), true);
        let (status, _, json) = send(&app.router, post_build(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("v9.9.9"));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let app = test_app(firmware(), false);
        let (status, _, json) = send(&app.router, post_build("not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "400");
        assert!(!app.root.path().join("work").exists());
    }

    #[tokio::test]
    async fn oversized_body_is_bad_request() {
        let app = test_app(firmware(), false);
        let (status, _, _) = send(&app.router, post_build("x".repeat(10_000))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn configure_failure_output_only_in_debug() {
        let failing = || FakeFirmware {
            fail_configure: true,
            ..firmware()
        };

        let app = test_app(failing(), true);
        let (status, _, json) = send(&app.router, post_build(REQUEST)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "500");
        assert!(json["context0"].as_str().unwrap().contains("CMake Error"));

        let app = test_app(failing(), false);
        let (status, _, json) = send(&app.router, post_build(REQUEST)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal Server Error");
        assert!(json.get("context0").is_none());
    }
}
