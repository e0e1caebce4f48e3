//! HTTP boundary for the findings browser.
//!
//! Translates JSON requests into mutation-engine and flattening calls and
//! owns the read-modify-write cycle against the document store. The two
//! collaborator endpoints (`/scrape`, `/chat`) are thin pass-throughs to
//! their modules.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check |
//! | `GET`    | `/issues` | Raw nested issue document |
//! | `GET`    | `/issues/flat` | Flattened display list |
//! | `POST`   | `/issues` | Create an issue |
//! | `PUT`    | `/issues/{id}` | Patch the issue titled `{id}` |
//! | `DELETE` | `/issues/{id}` | Delete the issue titled `{id}` |
//! | `POST`   | `/scrape` | Batch-fetch reference URLs as plain text |
//! | `POST`   | `/chat` | Remediation assistant completion |
//!
//! # Error Contract
//!
//! Failures return `{ "error": { "code": "...", "message": "..." } }` with
//! codes `bad_request` (400), `conflict` (409), `not_found` (404),
//! `storage_error` (500), and `upstream_error` (assistant/scrape
//! failures; assistant upstream statuses pass through). Messages stay
//! short: no stack traces, no internal paths.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted: the browser frontend
//! is served from a different origin in every deployment that matters.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::{self, AssistantError, ChatMessage, SourceText};
use crate::config::Config;
use crate::flatten::flatten;
use crate::mutate::{self, IssuePayload, MutationError};
use crate::scrape;
use crate::store::DocumentStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<DocumentStore>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = Arc::new(DocumentStore::open(&config.store)?);
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/issues", get(handle_get_issues).post(handle_create_issue))
        .route("/issues/flat", get(handle_flat_issues))
        .route(
            "/issues/{id}",
            put(handle_update_issue).delete(handle_delete_issue),
        )
        .route("/scrape", post(handle_scrape))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(state);

    println!("Findings Desk server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn storage_error(err: anyhow::Error) -> AppError {
    eprintln!("Error: storage failure: {:#}", err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage_error".to_string(),
        message: "could not read or write the issue store".to_string(),
    }
}

fn upstream_error(status: StatusCode, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

impl From<MutationError> for AppError {
    fn from(err: MutationError) -> Self {
        let (status, code) = match &err {
            MutationError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            MutationError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            MutationError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        let status = match &err {
            AssistantError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            AssistantError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AssistantError::Transport(_) | AssistantError::Malformed(_) => StatusCode::BAD_GATEWAY,
        };
        upstream_error(status, err.to_string())
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<Value> {
    Json(json!({"ok": true}))
}

// ============ GET /issues ============

/// Returns the raw nested document, the shape the settings view edits.
/// `sections` is always present, even for a brand-new store.
async fn handle_get_issues(
    State(state): State<AppState>,
) -> Result<Json<crate::models::IssueDocument>, AppError> {
    let doc = state.store.load().map_err(storage_error)?;
    Ok(Json(doc))
}

// ============ GET /issues/flat ============

/// Returns the flattened, de-duplicated display list the browser panel
/// consumes.
async fn handle_flat_issues(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let doc = state.store.load().map_err(storage_error)?;
    Ok(Json(json!({"issues": flatten(&doc)})))
}

// ============ POST /issues ============

async fn handle_create_issue(
    State(state): State<AppState>,
    Json(payload): Json<IssuePayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let created = state
        .store
        .mutate(|doc| mutate::create(doc, &payload))
        .map_err(storage_error)??;
    Ok((
        StatusCode::CREATED,
        Json(json!({"ok": true, "created": created})),
    ))
}

// ============ PUT /issues/{id} ============

async fn handle_update_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<IssuePayload>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .store
        .mutate(|doc| mutate::update(doc, &id, &patch))
        .map_err(storage_error)??;
    Ok(Json(json!({"ok": true, "updated": updated})))
}

// ============ DELETE /issues/{id} ============

async fn handle_delete_issue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .store
        .mutate(|doc| mutate::delete(doc, &id))
        .map_err(storage_error)??;
    Ok(Json(json!({"ok": true, "deleted": deleted})))
}

// ============ POST /scrape ============

async fn handle_scrape(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let urls: Vec<String> = body
        .get("urls")
        .and_then(|u| u.as_array())
        .ok_or_else(|| bad_request("urls must be an array of strings"))?
        .iter()
        .filter_map(|u| u.as_str())
        .map(|u| u.to_string())
        .collect();

    if scrape::prepare_urls(&urls, state.config.scrape.max_urls).is_empty() {
        return Err(bad_request("urls must contain at least one URL"));
    }

    let results = scrape::scrape_urls(&state.config.scrape, &urls)
        .await
        .map_err(|e| upstream_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({"results": results})))
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let messages: Vec<ChatMessage> = match body.get("messages") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| bad_request("messages must be an array of {role, content}"))?,
        None => Vec::new(),
    };
    if messages.is_empty() {
        return Err(bad_request("messages must not be empty"));
    }

    let sources: Vec<SourceText> = match body.get("sources") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| bad_request("sources must be an array of {url, text}"))?,
        None => Vec::new(),
    };

    let reply = assistant::complete(&state.config.assistant, &messages, &sources).await?;
    Ok(Json(json!({"reply": reply})))
}
