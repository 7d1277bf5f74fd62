use std::collections::HashSet;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::messages::{self, MAIN_MENU_BUTTON, START_REGISTRATION_BUTTON};
use crate::onboarding::{ChatEvent, Reply};
use crate::state::AppState;
use crate::store::StoreError;
use crate::telegram::{CallbackQuery, InlineButton, Message, Update};

const REGISTER_PREFIX: &str = "conf_register_";
const DECLINE_PREFIX: &str = "conf_decline_";

/// An answer to a conference invitation button.
#[derive(Debug, PartialEq, Eq)]
enum ConferenceAnswer {
    Register(Uuid),
    Decline(Uuid),
}

/// What an incoming message asks for.
#[derive(Debug, PartialEq, Eq)]
enum Intent {
    Machine(ChatEvent),
    ListConferences,
    Download {
        file_id: String,
        file_name: String,
        content_type: Option<String>,
    },
    Ignore,
}

pub async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    match process_update(&state, &body).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(err) => {
            error!(error = %format!("{err:#}"), "failed to process chat update");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": format!("{err:#}") })),
            )
                .into_response()
        }
    }
}

async fn process_update(state: &AppState, body: &[u8]) -> Result<()> {
    let update: Update = serde_json::from_slice(body).context("invalid chat update")?;
    if let Some(query) = update.callback_query {
        return handle_callback(state, query).await;
    }
    let Some(message) = update.message else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let chat_user_id = message.user_id();

    let event = match intent(&message) {
        Intent::Machine(event) => event,
        Intent::Ignore => return Ok(()),
        Intent::ListConferences => {
            return list_conferences(state, chat_id, chat_user_id).await;
        }
        Intent::Download {
            file_id,
            file_name,
            content_type,
        } => match state.files.download_file(&file_id).await {
            Ok(bytes) => ChatEvent::Document {
                file_name,
                content_type,
                bytes,
            },
            Err(err) => {
                warn!(chat_user_id, error = %err, "failed to download chat file");
                let reply = Reply::DocumentUploadFailed { file_name };
                send(state, chat_id, &messages::render(&reply)).await;
                return Ok(());
            }
        },
    };

    let replies = state
        .machine
        .handle(chat_user_id, event)
        .await
        .context("onboarding step failed")?;
    for reply in &replies {
        send(state, chat_id, &messages::render(reply)).await;
    }
    Ok(())
}

async fn list_conferences(state: &AppState, chat_id: i64, chat_user_id: i64) -> Result<()> {
    let conferences = state.store.upcoming_conferences().await?;
    send(state, chat_id, &messages::conference_header(conferences.len())).await;
    if conferences.is_empty() {
        return Ok(());
    }

    let registered: HashSet<Uuid> = state
        .store
        .conference_registrations(chat_user_id)
        .await?
        .into_iter()
        .collect();
    for (conference, participants) in &conferences {
        let is_registered = registered.contains(&conference.id);
        let text = messages::conference_card(conference, *participants, is_registered);
        if is_registered {
            send(state, chat_id, &text).await;
            continue;
        }
        let buttons = conference_buttons(conference.id);
        if let Err(err) = state
            .notifier
            .send_with_buttons(chat_id, &text, &buttons)
            .await
        {
            warn!(chat_id, error = %err, "failed to send conference invitation");
        }
    }
    Ok(())
}

async fn handle_callback(state: &AppState, query: CallbackQuery) -> Result<()> {
    if let Err(err) = state.notifier.answer_callback(&query.id).await {
        warn!(callback_id = %query.id, error = %err, "failed to answer callback query");
    }
    let chat_id = query.chat_id();
    let chat_user_id = query.from.id;
    let Some(answer) = query.data.as_deref().and_then(conference_answer) else {
        debug!(chat_user_id, data = ?query.data, "ignoring unknown callback");
        return Ok(());
    };

    let text = match answer {
        ConferenceAnswer::Decline(conference_id) => {
            info!(chat_user_id, %conference_id, "conference invitation declined");
            messages::CONFERENCE_DECLINED.to_string()
        }
        ConferenceAnswer::Register(conference_id) => {
            match state
                .store
                .register_for_conference(conference_id, chat_user_id)
                .await
            {
                Ok(created) => {
                    info!(chat_user_id, %conference_id, created, "conference registration");
                    let conferences = state.store.upcoming_conferences().await?;
                    let conference = conferences
                        .iter()
                        .map(|(conference, _)| conference)
                        .find(|conference| conference.id == conference_id);
                    messages::conference_registered(conference)
                }
                Err(StoreError::UserNotFound(_)) => messages::render(&Reply::NotRegistered),
                Err(StoreError::ConferenceNotFound(_)) => {
                    messages::CONFERENCE_NOT_FOUND.to_string()
                }
                Err(err) => return Err(err).context("conference registration failed"),
            }
        }
    };
    send(state, chat_id, &text).await;
    Ok(())
}

fn conference_buttons(conference_id: Uuid) -> Vec<InlineButton> {
    vec![
        InlineButton::new(
            messages::CONFERENCE_REGISTER_BUTTON,
            format!("{REGISTER_PREFIX}{conference_id}"),
        ),
        InlineButton::new(
            messages::CONFERENCE_DECLINE_BUTTON,
            format!("{DECLINE_PREFIX}{conference_id}"),
        ),
    ]
}

fn conference_answer(data: &str) -> Option<ConferenceAnswer> {
    if let Some(id) = data.strip_prefix(REGISTER_PREFIX) {
        return Uuid::parse_str(id).ok().map(ConferenceAnswer::Register);
    }
    if let Some(id) = data.strip_prefix(DECLINE_PREFIX) {
        return Uuid::parse_str(id).ok().map(ConferenceAnswer::Decline);
    }
    None
}

async fn send(state: &AppState, chat_id: i64, text: &str) {
    if let Err(err) = state.notifier.send_message(chat_id, text).await {
        warn!(chat_id, error = %err, "failed to send chat reply");
    }
}

fn intent(message: &Message) -> Intent {
    if let Some(text) = message.text.as_deref() {
        return text_intent(text);
    }
    if let Some(document) = &message.document {
        return Intent::Download {
            file_id: document.file_id.clone(),
            file_name: document
                .file_name
                .clone()
                .unwrap_or_else(|| format!("document_{}", document.file_id)),
            content_type: document.mime_type.clone(),
        };
    }
    if let Some(photo) = message.photo.as_ref().and_then(|sizes| sizes.last()) {
        return Intent::Download {
            file_id: photo.file_id.clone(),
            file_name: format!("photo_{}.jpg", photo.file_id),
            content_type: Some("image/jpeg".to_string()),
        };
    }
    Intent::Ignore
}

fn text_intent(text: &str) -> Intent {
    let trimmed = text.trim();
    if trimmed == MAIN_MENU_BUTTON {
        return Intent::Machine(ChatEvent::Cancel);
    }
    if trimmed == START_REGISTRATION_BUTTON {
        return Intent::Machine(ChatEvent::Start);
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .filter(|word| word.starts_with('/'))
        .map(|word| word.split('@').next().unwrap_or(word));
    let event = match command {
        Some("/start") => ChatEvent::Start,
        Some("/cancel") => ChatEvent::Cancel,
        Some("/questionnaire") => ChatEvent::StartInterview,
        Some("/done") => ChatEvent::Finish,
        Some("/roadmap") => ChatEvent::Roadmap,
        Some("/conferences") => return Intent::ListConferences,
        Some("/conferences_off") => ChatEvent::ToggleConferences,
        _ => ChatEvent::Text(text.to_string()),
    };
    Intent::Machine(event)
}
