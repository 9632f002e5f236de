//! HTTP front controller: JSON endpoints over a single shared chat session.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::agent::ChatSession;
use crate::error::{ApiError, ToolError};
use crate::tools::ToolRegistry;
use crate::tools::builtin::style::UI_STYLE_FILE;
use crate::workspace::Workspace;

/// Built-in page, used until `apply_upgrade` writes `static/index.html`.
const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Workspace directory served at `/static`.
const STATIC_DIR: &str = "static";

const UPGRADED_INDEX: &str = "static/index.html";

const MAX_PAGE_SIZE: u64 = 1024 * 1024;

const DEFAULT_VISION_INSTRUCTION: &str = "Describe the image.";

/// State shared across handlers. Every request that touches the
/// conversation holds the session lock until it has replied.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<ChatSession>>,
    pub tools: Arc<ToolRegistry>,
    pub workspace: Arc<Workspace>,
}

impl AppState {
    pub fn new(session: ChatSession, workspace: Arc<Workspace>) -> Self {
        let tools = Arc::clone(session.tools());
        Self {
            session: Arc::new(Mutex::new(session)),
            tools,
            workspace,
        }
    }
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.workspace.root().join(STATIC_DIR));
    Router::new()
        .route("/", get(index))
        .route("/ui_style.json", get(ui_style))
        .nest_service("/static", static_files)
        .route("/health", get(health))
        .route("/api/message", post(message))
        .route("/api/confirm", post(confirm))
        .route("/api/cancel", post(cancel))
        .route("/api/reset", post(reset))
        .route("/api/screenshot", post(screenshot))
        .route("/api/vision_analyze", post(vision_analyze))
        .route("/api/list_files", get(list_files))
        .route("/api/modify_code", post(modify_code))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": true, "message": message.into() })),
    )
        .into_response()
}

/// Serve the API on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "Alfred HTTP server listening");
    axum::serve(listener, router(state)).await
}

// ── Page / health ───────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Response {
    match state.workspace.read_bytes(UPGRADED_INDEX, MAX_PAGE_SIZE).await {
        Ok((_, bytes)) => match String::from_utf8(bytes) {
            Ok(page) => Html(page).into_response(),
            Err(_) => Html(INDEX_HTML).into_response(),
        },
        Err(_) => Html(INDEX_HTML).into_response(),
    }
}

/// The style written by `update_ui_style`, or `{}` when unset or unreadable.
async fn ui_style(State(state): State<AppState>) -> Json<Value> {
    let style = state
        .workspace
        .read_bytes(UI_STYLE_FILE, MAX_PAGE_SIZE)
        .await
        .ok()
        .and_then(|(_, bytes)| serde_json::from_slice::<Value>(&bytes).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    Json(style)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.lock().await;
    let orchestrator = session.orchestrator();
    Json(json!({
        "status": "ok",
        "service": "alfred",
        "remote": orchestrator.config().has_api_key(),
        "state": orchestrator.state(),
    }))
}

// ── Conversation ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: String,
}

async fn message(State(state): State<AppState>, Json(body): Json<MessageRequest>) -> Response {
    if body.message.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "message is required");
    }

    let reply = state.session.lock().await.message(&body.message).await;
    if reply.is_degraded() {
        warn!("Replying with degraded fallback");
    }
    Json(json!({
        "reply": reply.text,
        "degraded": reply.is_degraded(),
    }))
    .into_response()
}

async fn confirm(State(state): State<AppState>) -> impl IntoResponse {
    let reply = state.session.lock().await.confirm().await;
    Json(json!({ "reply": reply.text }))
}

async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    let reply = state.session.lock().await.cancel();
    Json(json!({ "reply": reply.text }))
}

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state
        .session
        .lock()
        .await
        .orchestrator_mut()
        .reset_conversation();
    info!("Conversation reset");
    Json(json!({ "status": "reset" }))
}

// ── Automation ──────────────────────────────────────────────────────────

async fn screenshot(State(state): State<AppState>) -> Response {
    match state.tools.execute("screenshot", json!({})).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            warn!(error = %e, "Screenshot failed");
            error_body(StatusCode::OK, e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct VisionRequest {
    #[serde(default)]
    image_base64: String,
    #[serde(default)]
    instruction: Option<String>,
}

async fn vision_analyze(
    State(state): State<AppState>,
    Json(body): Json<VisionRequest>,
) -> Response {
    if body.image_base64.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "image_base64 is required");
    }
    let instruction = body
        .instruction
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VISION_INSTRUCTION.to_string());

    let session = state.session.lock().await;
    match session
        .orchestrator()
        .analyze_image(&body.image_base64, &instruction)
        .await
    {
        Ok(text) => Json(json!({ "model_response": text })).into_response(),
        Err(ApiError::MissingCredential) => error_body(
            StatusCode::OK,
            "Vision analysis requires GOOGLE_API_KEY to be set.",
        ),
        Err(e) => {
            warn!(error = %e, "Vision analysis failed");
            error_body(StatusCode::OK, e.to_string())
        }
    }
}

// ── Files ───────────────────────────────────────────────────────────────

async fn list_files(State(state): State<AppState>) -> Response {
    match state.workspace.list_tree().await {
        Ok(entries) => {
            let files: Vec<String> = entries
                .into_iter()
                .filter(|e| !e.is_dir)
                .map(|e| e.path)
                .collect();
            Json(json!({ "files": files })).into_response()
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn modify_code(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state.tools.execute("modify_code", body).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status = match e {
                ToolError::Disabled { .. } | ToolError::NotAuthorized(_) => StatusCode::FORBIDDEN,
                ToolError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_body(status, e.to_string())
        }
    }
}
