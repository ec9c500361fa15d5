//! Inbound webhook endpoint and the per-callback handling flow.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::command;
use crate::config::Config;
use crate::notifier::{self, Notifier};
use crate::resolver::{Resolution, ResolverClient};
use crate::signature;

/// Shared application state. Immutable after startup; requests share
/// nothing else.
pub struct AppState {
    pub config: Config,
    pub resolver: ResolverClient,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let resolver = ResolverClient::new(config.resolver.clone())?;
        let notifier = Notifier::new(config.dingtalk.clone());
        Ok(Self {
            config,
            resolver,
            notifier,
        })
    }
}

/// Inbound DingTalk callback payload. Unknown fields are ignored; every
/// field the bridge reads tolerates absence.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CallbackEvent {
    pub is_at: bool,
    pub text: MessageText,
    pub sender_staff_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageText {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dingtalk", post(handle_callback))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "dingbot".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /dingtalk, the bot callback handler.
async fn handle_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<CallbackEvent>,
) -> Response {
    let timestamp = header_str(&headers, "timestamp");
    let sign = header_str(&headers, "sign");

    if !signature::verify(&state.config.dingtalk.secret, timestamp, sign) {
        info!("Rejected callback with invalid signature");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Invalid signature"})),
        )
            .into_response();
    }

    // Only react when the bot itself was mentioned.
    if !event.is_at {
        return Json(json!({"msg": "Not @ message, ignore"})).into_response();
    }

    let text = event.text.content.trim();
    info!(
        "Callback from {}: {}",
        event.sender_staff_id.as_deref().unwrap_or("<unknown>"),
        text
    );

    let Some(params) = command::parse(text) else {
        return Json(json!({"msg": "Invalid command format"})).into_response();
    };

    let mentions: Vec<String> = event.sender_staff_id.clone().into_iter().collect();

    let song_id = params.get("id").filter(|v| !v.is_empty());
    let source = params.get("s").filter(|v| !v.is_empty());
    let (Some(song_id), Some(source)) = (song_id, source) else {
        notify(&state, notifier::usage_error_text(), &mentions).await;
        return Json(json!({"msg": "Missing parameters"})).into_response();
    };
    let quality = params
        .get("p")
        .map(String::as_str)
        .unwrap_or(&state.config.resolver.default_quality);

    let resolution = state.resolver.resolve(song_id, source, quality).await;

    let reply = match &resolution {
        Resolution::Resolved(track) => notifier::success_text(source, song_id, quality, track),
        Resolution::Failed { error } => notifier::failure_text(error),
    };
    notify(&state, &reply, &mentions).await;

    Json(json!({"msg": "Message processed"})).into_response()
}

/// Best-effort delivery: a webhook failure is logged, never turned into an
/// HTTP error for the calling platform.
async fn notify(state: &AppState, content: &str, mentions: &[String]) {
    if let Err(e) = state.notifier.send_text(content, mentions).await {
        error!("Failed to deliver notification: {e:#}");
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
