use axum::{extract::State, Json};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::sync::{DealEvent, SyncOutcome};

/// Acknowledges every well-formed event; only stage-bearing deal updates
/// for a linked user change anything.
pub async fn crm_webhook(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let event = DealEvent::from_slice(&body)?;
    match state.gateway.on_deal_changed(event).await? {
        SyncOutcome::Ignored => Ok(Json(json!({ "status": "ok" }))),
        SyncOutcome::StageUpdated { notified, .. } => Ok(Json(json!({
            "status": "ok",
            "message": "Stage updated",
            "notified": notified,
        }))),
        SyncOutcome::UserNotFound { .. } => Err(AppError::not_found("User not found")),
    }
}
