use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};

/// Options for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    pub open_browser: bool,
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Serve until Ctrl-C.
pub async fn start_server(state: Arc<AppState>, options: ServerOptions) -> Result<()> {
    let mut app = build_router(state);

    if options.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if options.dev_mode { "0.0.0.0" } else { options.host.as_str() };
    let addr = format!("{}:{}", host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    let url = format!("http://{}", local_addr);
    tracing::info!(%url, "server listening");
    println!("roadcrew running at {}", url);

    if options.open_browser
        && let Err(err) = open::that(&url)
    {
        tracing::warn!(error = %err, "could not open browser");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => println!("\nShutting down..."),
        Err(err) => {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, QueueSection};
    use crate::jobs::{JobQueue, RunExecutor};
    use crate::results::RunResult;
    use crate::selection::{RunRequest, SelectionMode};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    struct EchoExecutor;

    #[async_trait]
    impl RunExecutor for EchoExecutor {
        async fn execute(&self, request: &RunRequest) -> RunResult {
            RunResult {
                planning_result: Some(format!("plan for {} ({})", request.input, request.mode)),
                ..RunResult::default()
            }
        }
    }

    fn test_router() -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.project_dir = dir.path().to_path_buf();
        std::fs::create_dir_all(config.roadmap_file().parent().unwrap()).unwrap();
        std::fs::write(
            config.roadmap_file(),
            "## Phase 1: Discovery and Design\n## Phase 2: Configuration and Bootstrap\n",
        )
        .unwrap();

        let (queue, _workers) = JobQueue::start(Arc::new(EchoExecutor), &QueueSection::default());
        let state = Arc::new(AppState::new(&config, queue).unwrap());
        (dir, build_router(state))
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get(app: &Router, uri: &str) -> axum::response::Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn poll_until_done(app: &Router, id: &str) -> Value {
        for _ in 0..200 {
            let json = body_json(get(app, &format!("/api/jobs/{}", id)).await).await;
            if json["state"] == "done" || json["state"] == "failed" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_router();
        let resp = get(&app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_form_submission_redirects_with_job_id() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/runs")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("user_input=1%2C2&mode=phases"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        let id = location.strip_prefix("/?job=").unwrap();

        let job = poll_until_done(&app, id).await;
        assert_eq!(job["state"], "done");
        assert_eq!(job["result"]["planning_result"], "plan for 1,2 (phases)");
        assert!(job["status"].is_string());
    }

    #[tokio::test]
    async fn test_json_submission_returns_accepted() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/runs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"input": "Build the chat module"}"#))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let json = body_json(resp).await;
        let status_url = json["status_url"].as_str().unwrap();
        assert_eq!(status_url, format!("/api/jobs/{}", json["job_id"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_blank_submission_is_rejected() {
        let (_dir, app) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/runs")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("user_input=+++"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_job_lookup_errors() {
        let (_dir, app) = test_router();
        assert_eq!(get(&app, "/api/jobs/not-a-uuid").await.status(), StatusCode::BAD_REQUEST);
        let missing = format!("/api/jobs/{}", uuid::Uuid::new_v4());
        assert_eq!(get(&app, &missing).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_roadmap_endpoint() {
        let (_dir, app) = test_router();
        let json = body_json(get(&app, "/api/roadmap").await).await;
        assert_eq!(json[0]["index"], 1);
        assert_eq!(json[0]["name"], "Phase 1: Discovery and Design");
        assert_eq!(json[1]["work_items"][0], "infra_setup");
    }

    #[tokio::test]
    async fn test_status_and_last_run_endpoints() {
        let (_dir, app) = test_router();
        let json = body_json(get(&app, "/api/status").await).await;
        assert_eq!(json["completed_items"], serde_json::json!([]));
        assert_eq!(get(&app, "/api/last-run").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_renders() {
        let (_dir, app) = test_router();
        let resp = get(&app, "/?job=unknown").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Phase 2: Configuration and Bootstrap"));
        assert!(html.contains("is unknown or has expired"));
    }

    #[test]
    fn test_mode_display_used_in_echo() {
        assert_eq!(SelectionMode::Phases.to_string(), "phases");
    }
}
