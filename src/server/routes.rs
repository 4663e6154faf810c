use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::AppState;
use crate::monitor::{Command, CommandOutcome};
use crate::notify::TransportMode;

const EVENT_MESSAGE: &str = "im.message.receive_v1";
const EVENT_CARD_ACTION: &str = "card.action.trigger";

pub(super) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root).post(callback))
        .route("/health", get(health))
        .route("/trigger/:command", get(trigger))
        .route("/command", axum::routing::post(command))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Claude Monitor API",
        "version": env!("CARGO_PKG_VERSION"),
        "transport": state.monitor.notifier().mode().as_str(),
        "endpoints": [
            "POST / - provider callback",
            "GET /health - health check",
            "GET /trigger/{command}?k=key&f=true - trigger a command",
            "POST /command - run a command (bearer auth)"
        ]
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": Local::now().to_rfc3339() }))
}

fn reject(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "code": status.as_u16(), "msg": msg }))).into_response()
}

/// Provider callback: url_verification first, then event envelopes
async fn callback(State(state): State<AppState>, body: String) -> Response {
    if let Some(challenge) = state.verifier.process_challenge(&body) {
        return Json(challenge).into_response();
    }

    if state.monitor.notifier().mode() != TransportMode::Application {
        tracing::warn!("Callback event received but interactive features need application mode");
        return reject(
            StatusCode::BAD_REQUEST,
            "interactive callbacks require application credentials",
        );
    }

    let envelope = match state.verifier.decode_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Rejected callback body: {}", e);
            return reject(StatusCode::BAD_REQUEST, "invalid callback body");
        }
    };

    let event_type = envelope
        .pointer("/header/event_type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match event_type {
        EVENT_MESSAGE => {
            tracing::debug!("Message event acknowledged");
            Json(json!({ "code": 0 })).into_response()
        }
        EVENT_CARD_ACTION => {
            let command = envelope
                .pointer("/event/action/value/command")
                .and_then(Value::as_str);
            match command.map(str::parse::<Command>) {
                Some(Ok(command)) => {
                    tracing::info!("Card action: {}", command);
                    let monitor = state.monitor.clone();
                    tokio::spawn(async move {
                        let outcome = monitor.run(command, false, None).await;
                        tracing::info!("Card action {} finished: {}", command, outcome.message);
                    });
                }
                Some(Err(e)) => tracing::warn!("Ignoring card action: {}", e),
                None => tracing::warn!("Card action without a command value"),
            }
            Json(json!({ "code": 0, "msg": "ok", "data": {} })).into_response()
        }
        other => {
            tracing::debug!("Unhandled callback event type {:?}", other);
            Json(json!({ "code": 0, "msg": "ok" })).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TriggerParams {
    k: Option<String>,
    #[serde(default)]
    f: bool,
}

async fn trigger(
    State(state): State<AppState>,
    Path(command): Path<String>,
    Query(params): Query<TriggerParams>,
) -> Response {
    if let Some(expected) = state.auth.simple_key.as_deref().filter(|k| !k.is_empty()) {
        match params.k.as_deref() {
            None => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(CommandOutcome::failure("Missing access key parameter k")),
                )
                    .into_response()
            }
            Some(k) if k != expected => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(CommandOutcome::failure("Access key parameter k is incorrect")),
                )
                    .into_response()
            }
            Some(_) => {}
        }
    }

    run_command(&state, &command, params.f, None).await
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    force_notify: bool,
    /// Usage range for `monitor_api_usage`/`full_monitor`; config value when absent
    #[serde(default)]
    time_range: Option<String>,
}

async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Response {
    let Some(expected) = state.auth.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server has no api key configured",
        );
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected) {
        return reject(StatusCode::UNAUTHORIZED, "invalid api key");
    }

    run_command(
        &state,
        &request.command,
        request.force_notify,
        request.time_range.as_deref(),
    )
    .await
}

async fn run_command(
    state: &AppState,
    name: &str,
    force_notify: bool,
    time_range: Option<&str>,
) -> Response {
    match state.monitor.run_named(name, force_notify, time_range).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            tracing::warn!("{}", e);
            (StatusCode::BAD_REQUEST, Json(CommandOutcome::failure(e.to_string()))).into_response()
        }
    }
}
