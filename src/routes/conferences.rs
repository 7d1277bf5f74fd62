use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminAccess;
use crate::error::{AppError, AppResult};
use crate::models::{Conference, NewConference};
use crate::state::AppState;

const DEFAULT_MAX_PARTICIPANTS: i32 = 100;

#[derive(Deserialize)]
pub struct CreateConferenceRequest {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: NaiveDateTime,
    pub join_link: String,
    pub max_participants: Option<i32>,
}

#[derive(Deserialize)]
pub struct RegistrationRequest {
    pub chat_user_id: i64,
}

#[derive(Serialize)]
pub struct ConferenceEntry {
    #[serde(flatten)]
    pub conference: Conference,
    pub participants: i64,
}

pub async fn list_conferences(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ConferenceEntry>>> {
    let entries = state
        .store
        .upcoming_conferences()
        .await?
        .into_iter()
        .map(|(conference, participants)| ConferenceEntry {
            conference,
            participants,
        })
        .collect();
    Ok(Json(entries))
}

pub async fn create_conference(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(payload): Json<CreateConferenceRequest>,
) -> AppResult<(StatusCode, Json<Conference>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    let join_link = payload.join_link.trim();
    if join_link.is_empty() {
        return Err(AppError::bad_request("join_link must not be empty"));
    }
    let max_participants = payload
        .max_participants
        .unwrap_or(DEFAULT_MAX_PARTICIPANTS);
    if max_participants <= 0 {
        return Err(AppError::bad_request("max_participants must be positive"));
    }

    let conference = state
        .store
        .create_conference(NewConference {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: payload
                .description
                .filter(|description| !description.trim().is_empty()),
            starts_at: payload.starts_at,
            join_link: join_link.to_string(),
            max_participants,
        })
        .await?;
    info!(conference_id = %conference.id, "conference created");
    Ok((StatusCode::CREATED, Json(conference)))
}

/// Re-registering is not an error: the response reports `"created": false`.
pub async fn register(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(conference_id): Path<Uuid>,
    Json(payload): Json<RegistrationRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let created = state
        .store
        .register_for_conference(conference_id, payload.chat_user_id)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(json!({ "created": created }))))
}
