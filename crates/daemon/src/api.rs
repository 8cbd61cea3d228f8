// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API: thin REST over the job store plus the websocket upgrade.
//!
//! Served by every process. Mutations require auth and are accepted only
//! on the leader: the job store is single-writer, and followers exist to
//! fan events out, not to write.

use crate::broadcast::Broadcaster;
use crate::env::{parse_bool, Config};
use crate::notifier::Notifier;
use crate::records;
use crate::scheduler::job_from_video;
use crate::ws::{serve_client, Hub};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use vtrec_core::{build_job_filename, AutoRule, JobPayload, JobStatus, Platform, RuleChain, RuleKind};
use vtrec_discovery::{HolodexClient, LiveIndexClient};
use vtrec_storage::Store;

pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Mutex<Store>>,
    pub broadcaster: Broadcaster,
    pub notifier: Notifier,
    pub holodex: Arc<HolodexClient>,
    pub live_index: Arc<LiveIndexClient>,
    pub hub: Hub,
    pub is_leader: bool,
}

type SharedState = Arc<AppState>;

/// `Authorization: Password <secret>`, or the `X-Auth-Token` /
/// `X-Password` equivalents.
pub(crate) fn check_auth_header(headers: &HeaderMap, secret: &str) -> bool {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(password) = auth.strip_prefix("Password ") {
            if password == secret {
                return true;
            }
        }
    }
    for name in ["x-auth-token", "x-password"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if value == secret {
                return true;
            }
        }
    }
    false
}

/// Guard for mutating handlers: auth first, then the single-writer rule
/// (only the leader mutates the store).
fn secure_access(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    if !check_auth_header(headers, &state.config.password) {
        return Some((StatusCode::UNAUTHORIZED, "Unauthorized").into_response());
    }
    if !state.is_leader {
        return Some(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "mutations are served by the leader process"})),
            )
                .into_response(),
        );
    }
    None
}

/// Deletion gate: only settled jobs go quietly; `force` overrides.
pub(crate) fn deletable(status: JobStatus, force: bool) -> bool {
    force
        || matches!(
            status,
            JobStatus::Done
                | JobStatus::Cleaning
                | JobStatus::Waiting
                | JobStatus::Error
                | JobStatus::Cancelled
        )
}

fn rule_json(rule: &AutoRule) -> Value {
    json!({
        "id": rule.id,
        "type": rule.kind.to_string(),
        "data": rule.data,
        "chains": if rule.chains.is_empty() { Value::Null } else { json!(rule.chains) },
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<String>,
    include: Option<Value>,
    chains: Option<Value>,
}

fn parse_chains(raw: &Value) -> Result<Vec<RuleChain>, String> {
    let list: Vec<&Value> = match raw {
        Value::Object(_) => vec![raw],
        Value::Array(items) => items.iter().collect(),
        _ => return Err("chains must be an object or a list".to_string()),
    };
    let mut chains = Vec::new();
    for (idx, entry) in list.iter().enumerate() {
        let kind = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Missing type for chains.{idx}"))?;
        let kind = RuleKind::parse(kind).ok_or_else(|| format!("Invalid type for chains.{idx}"))?;
        let data = entry
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("Missing data for chains.{idx}"))?;
        chains.push(RuleChain { kind, data: data.to_string() });
    }
    Ok(chains)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) > 0,
        Value::String(s) => parse_bool(s),
        _ => false,
    }
}

/// Validate an insert body into a rule (id assigned by the store).
pub(crate) fn validate_rule_body(body: &RuleBody) -> Result<AutoRule, String> {
    let kind = body.kind.as_deref().ok_or("Missing type")?;
    let kind = RuleKind::parse(kind)
        .ok_or("Invalid type, must be `channel`, `group`, `word`, `regex_word`")?;
    let data = body.data.as_deref().map(str::trim).unwrap_or_default();
    if data.is_empty() {
        return Err("Missing data".to_string());
    }

    let chains = match &body.chains {
        Some(raw) if kind.allows_chains() => parse_chains(raw)?,
        _ => Vec::new(),
    };

    let rule = AutoRule {
        id: 0,
        kind,
        data: data.to_string(),
        include: body.include.as_ref().map(truthy).unwrap_or(true),
        chains,
    };
    rule.validate().map_err(|err| format!("Invalid regex: {err}"))?;
    Ok(rule)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

// -------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn list_jobs(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let include_done = params
        .get("include_done")
        .map(|raw| parse_bool(raw))
        .unwrap_or(false);
    let jobs: Vec<JobPayload> = state
        .store
        .lock()
        .jobs()
        .filter(|job| include_done || job.status != JobStatus::Done)
        .map(JobPayload::from)
        .collect();
    Json(json!({"data": jobs}))
}

async fn get_job(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.store.lock().job(&id) {
        Some(job) => Json(JobPayload::from(job)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Video not found"),
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    id: String,
    platform: Option<String>,
}

async fn schedule_add(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ScheduleBody>,
) -> Response {
    if let Some(denied) = secure_access(&state, &headers) {
        return denied;
    }
    let platform = match body.platform.as_deref() {
        None => Platform::Youtube,
        Some(name) => match Platform::parse(name) {
            Some(platform) => platform,
            None => return error_response(StatusCode::BAD_REQUEST, "Invalid platform"),
        },
    };
    tracing::info!(id = %body.id, %platform, "schedule request received");

    let video = match platform {
        Platform::Youtube => match state.holodex.get_video(&body.id).await {
            Ok(video) => video,
            Err(err) => {
                tracing::error!(%err, "holodex resolve failed");
                return error_response(StatusCode::BAD_GATEWAY, "Discovery API is not ready");
            }
        },
        _ => match state.live_index.get_lives().await {
            Ok(videos) => videos
                .into_iter()
                .find(|video| video.platform == platform && video.id == body.id),
            Err(err) => {
                tracing::error!(%err, "live index resolve failed");
                return error_response(StatusCode::BAD_GATEWAY, "Discovery API is not ready");
            }
        },
    };
    let Some(video) = video else {
        return error_response(StatusCode::NOT_FOUND, "Video not found");
    };

    let job_id = video.job_id();
    let existing = state.store.lock().job(&job_id).cloned();
    match existing {
        Some(_) => {
            // Scheduling the same id twice merges; identity is preserved.
            let filename = build_job_filename(video.start_time, &job_id, &video.title);
            let updated = state.store.lock().update_job(&job_id, |job| {
                job.title = video.title.clone();
                job.filename = filename.clone();
                job.start_time = video.start_time;
                job.member_only = video.is_member;
            });
            match updated {
                Ok(Some(job)) => {
                    state.broadcaster.job_update(&job).await;
                }
                other => {
                    tracing::error!(job_id = %job_id, ?other, "merge update failed");
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure");
                }
            }
        }
        None => {
            let job = job_from_video(&video);
            if let Err(err) = state.store.lock().upsert_job(job.clone()) {
                tracing::error!(job_id = %job.id, %err, "failed to persist scheduled job");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure");
            }
            state.broadcaster.job_scheduled(&job).await;
            state.notifier.job_update(&job);
        }
    }
    Json(video).into_response()
}

async fn schedule_delete(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(denied) = secure_access(&state, &headers) {
        return denied;
    }
    let force = params.get("force").map(|raw| parse_bool(raw)).unwrap_or(false);
    let Some(job) = state.store.lock().job(&id).cloned() else {
        return error_response(StatusCode::NOT_FOUND, "Video not found");
    };
    if !deletable(job.status, force) {
        return error_response(
            StatusCode::NOT_ACCEPTABLE,
            "Current video status does not allow you to delete video",
        );
    }
    if let Err(err) = state.store.lock().delete_job(&id) {
        tracing::error!(job_id = %id, %err, "failed to delete job");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure");
    }
    state.broadcaster.job_delete(&id).await;
    Json(JobPayload::from(&job)).into_response()
}

async fn list_rules(State(state): State<SharedState>) -> impl IntoResponse {
    let store = state.store.lock();
    let include: Vec<Value> = store.rules().iter().filter(|r| r.include).map(rule_json).collect();
    let exclude: Vec<Value> = store.rules().iter().filter(|r| !r.include).map(rule_json).collect();
    Json(json!({"include": include, "exclude": exclude}))
}

async fn rule_add(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<RuleBody>,
) -> Response {
    if let Some(denied) = secure_access(&state, &headers) {
        return denied;
    }
    let rule = match validate_rule_body(&body) {
        Ok(rule) => rule,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };
    match state.store.lock().insert_rule(rule) {
        Ok(stored) => Json(rule_json(&stored)).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to persist rule");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure")
        }
    }
}

async fn rule_patch(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<RuleBody>,
) -> Response {
    if let Some(denied) = secure_access(&state, &headers) {
        return denied;
    }
    if body.kind.is_none() && body.data.is_none() && body.include.is_none() && body.chains.is_none()
    {
        return error_response(StatusCode::BAD_REQUEST, "No fields to update");
    }
    let Some(current) = state.store.lock().rule(id).cloned() else {
        return error_response(StatusCode::NOT_FOUND, "Rule not found");
    };

    let mut next = current.clone();
    if let Some(kind) = &body.kind {
        match RuleKind::parse(kind) {
            Some(kind) => next.kind = kind,
            None => return error_response(StatusCode::BAD_REQUEST, "Invalid type"),
        }
    }
    if let Some(data) = &body.data {
        let data = data.trim();
        if data.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Invalid data format, cannot be empty");
        }
        next.data = data.to_string();
    }
    if let Some(include) = &body.include {
        next.include = truthy(include);
    }
    if let Some(raw) = &body.chains {
        if !next.kind.allows_chains() {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Chains are only valid for word and regex_word rules",
            );
        }
        match parse_chains(raw) {
            Ok(chains) => next.chains = chains,
            Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
        }
    }
    if let Err(err) = next.validate() {
        return error_response(StatusCode::BAD_REQUEST, format!("Invalid regex: {err}"));
    }

    let updated = state.store.lock().update_rule(id, |rule| *rule = next.clone());
    match updated {
        Ok(Some(rule)) => Json(rule_json(&rule)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Rule not found"),
        Err(err) => {
            tracing::error!(%err, "failed to update rule");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure")
        }
    }
}

async fn rule_delete(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if let Some(denied) = secure_access(&state, &headers) {
        return denied;
    }
    match state.store.lock().delete_rule(id) {
        Ok(Some(rule)) => Json(rule_json(&rule)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Rule not found"),
        Err(err) => {
            tracing::error!(%err, "failed to delete rule");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Store failure")
        }
    }
}

async fn get_records(State(state): State<SharedState>) -> impl IntoResponse {
    Json(records::read_cache(&state.config))
}

async fn ws_upgrade(State(state): State<SharedState>, upgrade: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let init_jobs: Vec<JobPayload> = state
        .store
        .lock()
        .jobs()
        .filter(|job| job.status != JobStatus::Done)
        .map(JobPayload::from)
        .collect();
    upgrade.on_upgrade(move |socket| serve_client(hub, socket, init_jobs))
}

/// Build the router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/schedule", axum::routing::post(schedule_add))
        .route("/api/schedule/:id", axum::routing::delete(schedule_delete))
        .route("/api/status", get(list_jobs))
        .route("/api/status/:id", get(get_job))
        .route("/api/auto-scheduler", get(list_rules).post(rule_add))
        .route(
            "/api/auto-scheduler/:id",
            axum::routing::patch(rule_patch).delete(rule_delete),
        )
        .route("/api/records", get(get_records))
        .route("/ws", get(ws_upgrade))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
