
use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, images};

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
    })
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(images::router())
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Binds `host:port`, resolving host names such as `localhost` or `::`.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("bind {host}:{port}"))
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = bind(host, port).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod app_tests {
    use super::*;
    use crate::state::testing::{StubFetcher, StubGenerator, TestApp};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn binds_by_host_name() {
        let listener = bind("localhost", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let v = json_of(&body);
        assert_eq!(v["status"], "healthy");
        assert!(v["timestamp"].is_string());
    }

    #[tokio::test]
    async fn signup_login_scenario() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/signup",
            Some(json!({"email": "a@x.com", "password": "secret1", "name": "Ann"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = json_of(&body);
        assert!(created["id"].is_string());
        assert_eq!(created["email"], "a@x.com");
        assert_eq!(created["name"], "Ann");
        assert!(created["createdAt"].is_string());
        assert!(created.get("passwordHash").is_none());

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            Some(json!({"email": "a@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["id"], created["id"]);

        let (status, wrong) = send(
            &app,
            Method::POST,
            "/auth/login",
            Some(json!({"email": "a@x.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, unknown) = send(
            &app,
            Method::POST,
            "/auth/login",
            Some(json!({"email": "nobody@x.com", "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&wrong), json_of(&unknown));
        assert_eq!(json_of(&wrong)["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn duplicate_signup_is_bad_request() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let body = json!({"email": "a@x.com", "password": "secret1", "name": "Ann"});
        let (status, _) = send(&app, Method::POST, "/auth/signup", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let dup = json!({"email": " A@X.com", "password": "secret1", "name": "Ann"});
        let (status, body) = send(&app, Method::POST, "/auth/signup", Some(dup)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "User already exists");
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_bad_request() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/signup")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(json_of(&bytes)["error"].is_string());
    }

    #[tokio::test]
    async fn generate_then_fetch_list_and_delete() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({"prompt": "cat", "userId": "U"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let generated = json_of(&body);
        let filename = generated["filename"].as_str().unwrap().to_string();
        let url = generated["url"].as_str().unwrap().to_string();
        assert_eq!(url, format!("/images/U/{filename}"));

        let req = Request::builder().uri(&url).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "image/png");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], TestApp::IMAGE_BYTES);

        let (status, body) = send(&app, Method::GET, "/user/U/images", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = json_of(&body);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], generated["id"]);
        assert_eq!(listed[0]["prompt"], "cat");
        assert_eq!(listed[0]["options"]["width"], 512);
        assert_eq!(listed[0]["options"]["negativePrompt"], "");

        let id = generated["id"].as_str().unwrap();
        let (status, body) = send(&app, Method::DELETE, &format!("/images/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["message"], "Image deleted successfully");

        let (status, _) = send(&app, Method::GET, &url, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, &format!("/images/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_passes_custom_options() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let (status, _) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({
                "prompt": "cat",
                "userId": "U",
                "options": {"width": 768, "negativePrompt": "dog", "seed": 7}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, options) = t.generator.last_call().unwrap();
        assert_eq!(options.width, 768);
        assert_eq!(options.height, 512);
        assert_eq!(options.steps, 30);
        assert_eq!(options.negative_prompt, "dog");
        assert_eq!(options.seed, 7);
    }

    #[tokio::test]
    async fn generate_validation_errors() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({"userId": "U"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Prompt is required");

        let (status, body) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({"prompt": "cat"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "User ID is required");
    }

    #[tokio::test]
    async fn provider_failure_is_500() {
        let t = TestApp::with_generator(Arc::new(StubGenerator::failing()));
        let app = build_app(t.state.clone());
        let (status, body) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({"prompt": "cat", "userId": "U"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body)["error"], "Failed to generate image");
    }

    #[tokio::test]
    async fn download_failure_is_500_and_gallery_stays_empty() {
        let t = TestApp::with_fetcher(StubFetcher::failing());
        let app = build_app(t.state.clone());
        let (status, body) = send(
            &app,
            Method::POST,
            "/generate-image",
            Some(json!({"prompt": "cat", "userId": "U"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_of(&body), json!({"error": "Failed to store generated image"}));

        let (status, body) = send(&app, Method::GET, "/user/U/images", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!([]));
    }

    #[tokio::test]
    async fn unknown_user_has_empty_gallery_and_missing_file_is_404() {
        let t = TestApp::new();
        let app = build_app(t.state.clone());
        let (status, body) = send(&app, Method::GET, "/user/nobody/images", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!([]));

        let (status, body) = send(&app, Method::GET, "/images/nobody/missing.png", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_of(&body)["error"], "Image not found");
    }
}
