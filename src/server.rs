//! Axum HTTP routes for job submission.
//!
//! `/parse` accepts `namespace`, `filepath` and `port` as query parameters,
//! as a urlencoded form body, or both; body fields take precedence. Replies
//! are always `200 OK` with a `{ret, message, code}` body, even when the
//! request cannot be decoded; `code` tells callers why it was rejected.

use crate::error::{AuditError, Result};
use crate::job::{JobDispatcher, SubmitResponse, Submission};
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state
pub struct AppState {
    pub dispatcher: JobDispatcher,
}

/// Raw submission fields; missing ones are treated as empty
#[derive(Debug, Default, Deserialize)]
pub struct ParseParams {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub port: String,
}

impl ParseParams {
    /// Fill fields left empty in `self` from `fallback`
    pub fn or(self, fallback: ParseParams) -> ParseParams {
        let pick = |primary: String, other: String| if primary.is_empty() { other } else { primary };
        ParseParams {
            namespace: pick(self.namespace, fallback.namespace),
            filepath: pick(self.filepath, fallback.filepath),
            port: pick(self.port, fallback.port),
        }
    }
}

fn query_params(query: std::result::Result<Query<ParseParams>, QueryRejection>) -> ParseParams {
    match query {
        Ok(Query(params)) => params,
        Err(e) => {
            debug!(error = %e, "undecodable query string, treating fields as empty");
            ParseParams::default()
        }
    }
}

// ─── Route builder ───────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/parse", get(parse_query).post(parse_form))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "rdb-memaudit",
    }))
}

async fn parse_query(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ParseParams>, QueryRejection>,
) -> Json<SubmitResponse> {
    Json(submit(&state, query_params(query)).await)
}

async fn parse_form(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ParseParams>, QueryRejection>,
    form: std::result::Result<Form<ParseParams>, FormRejection>,
) -> Json<SubmitResponse> {
    let body = match form {
        Ok(Form(params)) => params,
        Err(e) => {
            // a body-less POST with only query parameters lands here
            debug!(error = %e, "no usable form body, using query parameters");
            ParseParams::default()
        }
    };
    Json(submit(&state, body.or(query_params(query))).await)
}

async fn submit(state: &AppState, params: ParseParams) -> SubmitResponse {
    let result = match Submission::validate(&params.namespace, &params.filepath, &params.port) {
        Ok(submission) => {
            let instance = submission.instance();
            state.dispatcher.submit(submission).await.map(|()| instance)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(instance) => {
            info!(instance = %instance, path = %params.filepath, "job submitted");
            SubmitResponse::accepted()
        }
        Err(e) => {
            warn!(path = %params.filepath, port = %params.port, error = %e, "submission rejected");
            SubmitResponse::from(&e)
        }
    }
}

// ─── Server startup ──────────────────────────────────────────────

/// Serve job submissions until Ctrl+C
pub async fn serve(addr: SocketAddr, dispatcher: JobDispatcher) -> Result<()> {
    let state = Arc::new(AppState { dispatcher });
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    eprintln!("Job server listening on http://{}", addr);
    eprintln!("API endpoints:");
    eprintln!("  GET  /health");
    eprintln!("  GET  /parse?namespace=..&filepath=..&port=..");
    eprintln!("  POST /parse (form body and/or query: namespace, filepath, port)");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AuditError::Io)?;

    eprintln!("\nServer shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down gracefully...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use crate::sink::MemorySink;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemorySink>, tokio::task::JoinHandle<()>) {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, handle) = JobDispatcher::spawn(Arc::new(AuditConfig::default()), sink.clone());
        (build_router(Arc::new(AppState { dispatcher })), sink, handle)
    }

    fn record_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"key":"session:9","type":"string","bytes":42,"num_of_elem":1}}"#).unwrap();
        file
    }

    async fn send(app: Router, request: Request<Body>) -> SubmitResponse {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        SubmitResponse {
            ret: json["ret"].as_bool().unwrap(),
            message: json["message"].as_str().unwrap().to_string(),
            code: json["code"].as_u64().unwrap() as u32,
        }
    }

    fn form_post(uri: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_params_body_wins_over_query() {
        let body = ParseParams {
            namespace: "body".into(),
            filepath: String::new(),
            port: "7000".into(),
        };
        let query = ParseParams {
            namespace: "query".into(),
            filepath: "/data/dump.jsonl".into(),
            port: "6379".into(),
        };
        let merged = body.or(query);
        assert_eq!(merged.namespace, "body");
        assert_eq!(merged.filepath, "/data/dump.jsonl");
        assert_eq!(merged.port, "7000");
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_rejects_bad_path_before_port() {
        let (app, _, _) = app();
        let request = Request::get("/parse?namespace=ns&filepath=dump.rdb&port=x")
            .body(Body::empty())
            .unwrap();
        let response = send(app, request).await;
        assert!(!response.ret);
        assert_eq!(response.code, 1);
    }

    #[tokio::test]
    async fn test_post_form_rejects_bad_port() {
        let file = record_file();
        let (app, _, _) = app();
        let body = format!("namespace=ns&filepath={}&port=12", file.path().display());
        let response = send(app, form_post("/parse", body)).await;
        assert_eq!(response.code, 2);
    }

    #[tokio::test]
    async fn test_post_form_body_overrides_query() {
        let file = record_file();
        let (app, _, _) = app();
        let uri = format!("/parse?namespace=ns&filepath={}&port=6379", file.path().display());
        let response = send(app, form_post(&uri, "port=12".to_string())).await;
        assert_eq!(response.code, 2);
    }

    #[tokio::test]
    async fn test_post_with_query_only_runs_job() {
        let file = record_file();
        let (app, sink, handle) = app();
        let uri = format!("/parse?namespace=web&filepath={}&port=6379", file.path().display());
        let request = Request::post(uri).body(Body::empty()).unwrap();

        let response = send(app, request).await;
        assert_eq!(response, SubmitResponse::accepted());

        // the router owned the only dispatcher handle
        handle.await.unwrap();
        assert_eq!(
            sink.get("web:6379:TotalBytesAndNum").unwrap(),
            r#"{"totleNum":1,"totleBytes":42}"#
        );
    }

    #[tokio::test]
    async fn test_post_with_foreign_body_still_answers_json() {
        let (app, _, _) = app();
        let request = Request::post("/parse")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = send(app, request).await;
        assert!(!response.ret);
        assert_eq!(response.code, 1);
    }

    #[tokio::test]
    async fn test_get_accepts_and_runs_job() {
        let file = record_file();
        let (app, sink, handle) = app();
        let uri = format!("/parse?namespace=api&filepath={}&port=16379", file.path().display());

        let response = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert!(response.ret);

        handle.await.unwrap();
        assert!(sink.get("api:16379:TypeAndBytes").unwrap().contains("string"));
    }
}
