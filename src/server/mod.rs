//! HTTP server module
//!
//! - `POST /run` executes a snippet, behind Basic auth when configured
//! - `GET /health` is always open

mod auth;
mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AuthConfig;
use crate::pipeline::CodeRunner;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CodeRunner>,
    pub auth: Option<Arc<AuthConfig>>,
}

impl AppState {
    pub fn new(runner: CodeRunner, auth: Option<AuthConfig>) -> Self {
        AppState {
            runner: Arc::new(runner),
            auth: auth.map(Arc::new),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/run", post(handlers::run_code))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::basic_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::{FakePackageManager, InstallPolicy, Provisioner, PythonRuntime};
    use crate::sandbox::{OsSandbox, ResourceLimits};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        _scratch: TempDir,
    }

    fn app(auth: Option<AuthConfig>) -> TestApp {
        let scratch = tempdir().unwrap();
        let runner = CodeRunner::new(
            PythonRuntime::new("python3"),
            Provisioner::new(
                Arc::new(FakePackageManager::new(&["json"], &["requests"])),
                InstallPolicy::allow_only(["numpy"]),
            ),
            Arc::new(OsSandbox::new("python3", scratch.path())),
            ResourceLimits::new(5, 0, Duration::from_secs(1)),
            4,
        );
        TestApp {
            router: build_router(AppState::new(runner, auth)),
            _scratch: scratch,
        }
    }

    fn credentials() -> AuthConfig {
        AuthConfig {
            username: "admin".to_string(),
            password: SecretString::from("hunter2"),
        }
    }

    fn run_request(body: Value, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/run")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_run_returns_output() {
        let app = app(None);
        let (status, body) = send(
            &app.router,
            run_request(json!({"code": "def run(a, b):\n    return a + b", "args": [2, 3]}), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"stdout": "5", "stderr": "", "exit_code": 0}));
    }

    #[tokio::test]
    async fn test_large_integer_args_are_exact() {
        let app = app(None);
        let body: Value = serde_json::from_str(
            r#"{"code": "def run(x):\n    return x * 10", "args": [12345678901234567890123]}"#,
        )
        .unwrap();
        let (status, body) = send(&app.router, run_request(body, None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stdout"], json!("123456789012345678901230"));
    }

    #[tokio::test]
    async fn test_user_exception_is_still_200() {
        let app = app(None);
        let (status, body) = send(
            &app.router,
            run_request(json!({"code": "def run():\n    raise ValueError('boom')", "args": []}), None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_ne!(body["exit_code"], json!(0));
        assert!(body["stderr"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_is_400() {
        let app = app(None);
        let (status, body) = send(
            &app.router,
            run_request(json!({"code": "while True: pass\ndef run(): pass", "args": []}), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_denied_import_is_400() {
        let app = app(None);
        let (status, body) = send(
            &app.router,
            run_request(json!({"code": "import requests\ndef run(): return 1", "args": []}), None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("requests"));
    }

    #[tokio::test]
    async fn test_empty_code_is_400() {
        let app = app(None);
        let (status, body) = send(&app.router, run_request(json!({"code": "   ", "args": []}), None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_rejection_status() {
        let app = app(None);
        let (status, body) = send(&app.router, run_request(json!({"args": []}), None)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_auth_required_when_configured() {
        let app = app(Some(credentials()));
        let body = json!({"code": "def run(): return 1", "args": []});

        let (status, detail) = send(&app.router, run_request(body.clone(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(detail, json!({"detail": "Unauthorized"}));

        let (status, _) = send(&app.router, run_request(body.clone(), Some("Bearer abc"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let wrong = format!("Basic {}", STANDARD.encode("admin:nope"));
        let (status, detail) = send(&app.router, run_request(body.clone(), Some(&wrong))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(detail, json!({"detail": "Invalid basic auth"}));

        let (status, detail) = send(&app.router, run_request(body.clone(), Some("Basic !!!"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(detail, json!({"detail": "Invalid basic auth"}));

        let right = format!("Basic {}", STANDARD.encode("admin:hunter2"));
        let (status, detail) = send(&app.router, run_request(body, Some(&right))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["stdout"], json!("1"));
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let app = app(Some(credentials()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}
