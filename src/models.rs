use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCategory {
    Crypto,
    Mfo,
    Bank,
}

impl ClientCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientCategory::Crypto => "CRYPTO",
            ClientCategory::Mfo => "MFO",
            ClientCategory::Bank => "BANK",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClientCategory::Crypto => "Криптовалюта",
            ClientCategory::Mfo => "МФО",
            ClientCategory::Bank => "Банки",
        }
    }
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CRYPTO" => Ok(ClientCategory::Crypto),
            "MFO" => Ok(ClientCategory::Mfo),
            "BANK" => Ok(ClientCategory::Bank),
            other => Err(format!("unknown client category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(primary_key(chat_user_id))]
pub struct User {
    pub chat_user_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub crm_contact_id: Option<i64>,
    pub crm_deal_id: Option<i64>,
    pub current_stage: Option<String>,
    pub client_category: Option<String>,
    pub conference_opt_out: bool,
    pub archive_folder_id: Option<String>,
    pub registered_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn category(&self) -> Option<ClientCategory> {
        self.client_category
            .as_deref()
            .and_then(|value| value.parse().ok())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub chat_user_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub crm_contact_id: Option<i64>,
    pub crm_deal_id: Option<i64>,
    pub current_stage: Option<String>,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = answers)]
#[diesel(belongs_to(User, foreign_key = chat_user_id))]
#[diesel(primary_key(chat_user_id, question_number))]
pub struct Answer {
    pub chat_user_id: i64,
    pub question_number: i32,
    pub answer_text: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = answers)]
pub struct NewAnswer<'a> {
    pub chat_user_id: i64,
    pub question_number: i32,
    pub answer_text: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(User, foreign_key = chat_user_id))]
pub struct Document {
    pub id: Uuid,
    pub chat_user_id: i64,
    pub document_type: String,
    pub file_name: String,
    pub archive_file_id: Option<String>,
    pub uploaded_at: NaiveDateTime,
    pub is_validated: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub chat_user_id: i64,
    pub document_type: String,
    pub file_name: String,
    pub archive_file_id: Option<String>,
}

/// Position of a chat user in the onboarding conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingName,
    AwaitingPhone,
    Interviewing { question: u8 },
    CollectingDocuments,
    Complete,
    Cancelled,
}

impl ConversationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Complete | ConversationState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::AwaitingName => "awaiting_name",
            ConversationState::AwaitingPhone => "awaiting_phone",
            ConversationState::Interviewing { .. } => "interviewing",
            ConversationState::CollectingDocuments => "collecting_documents",
            ConversationState::Complete => "complete",
            ConversationState::Cancelled => "cancelled",
        }
    }

    pub fn question(&self) -> Option<u8> {
        match self {
            ConversationState::Interviewing { question } => Some(*question),
            _ => None,
        }
    }

    pub fn from_parts(state: &str, question: Option<i32>) -> Option<Self> {
        let parsed = match state {
            "awaiting_name" => ConversationState::AwaitingName,
            "awaiting_phone" => ConversationState::AwaitingPhone,
            "interviewing" => {
                let question = u8::try_from(question?).ok()?;
                ConversationState::Interviewing { question }
            }
            "collecting_documents" => ConversationState::CollectingDocuments,
            "complete" => ConversationState::Complete,
            "cancelled" => ConversationState::Cancelled,
            _ => return None,
        };
        Some(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub chat_user_id: i64,
    pub state: ConversationState,
    pub pending_full_name: Option<String>,
}

impl Conversation {
    pub fn new(chat_user_id: i64, state: ConversationState) -> Self {
        Self {
            chat_user_id,
            state,
            pending_full_name: None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = conversations)]
#[diesel(primary_key(chat_user_id))]
pub struct ConversationRow {
    pub chat_user_id: i64,
    pub state: String,
    pub pending_full_name: Option<String>,
    pub current_question: Option<i32>,
    pub updated_at: NaiveDateTime,
}

impl ConversationRow {
    pub fn into_conversation(self) -> Option<Conversation> {
        let state = ConversationState::from_parts(&self.state, self.current_question)?;
        Some(Conversation {
            chat_user_id: self.chat_user_id,
            state,
            pending_full_name: self.pending_full_name,
        })
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = conversations)]
#[diesel(treat_none_as_null = true)]
pub struct ConversationUpsert<'a> {
    pub chat_user_id: i64,
    pub state: &'a str,
    pub pending_full_name: Option<&'a str>,
    pub current_question: Option<i32>,
    pub updated_at: NaiveDateTime,
}

impl<'a> ConversationUpsert<'a> {
    pub fn from_conversation(conversation: &'a Conversation, now: NaiveDateTime) -> Self {
        Self {
            chat_user_id: conversation.chat_user_id,
            state: conversation.state.as_str(),
            pending_full_name: conversation.pending_full_name.as_deref(),
            current_question: conversation.state.question().map(i32::from),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = conferences)]
pub struct Conference {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: NaiveDateTime,
    pub join_link: String,
    pub max_participants: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = conferences)]
pub struct NewConference {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: NaiveDateTime,
    pub join_link: String,
    pub max_participants: i32,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = conference_registrations)]
#[diesel(belongs_to(Conference))]
#[diesel(belongs_to(User, foreign_key = chat_user_id))]
#[diesel(primary_key(conference_id, chat_user_id))]
pub struct ConferenceRegistration {
    pub conference_id: Uuid,
    pub chat_user_id: i64,
    pub registered_at: NaiveDateTime,
    pub attended: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = conference_registrations)]
pub struct NewConferenceRegistration {
    pub conference_id: Uuid,
    pub chat_user_id: i64,
}

pub const MESSAGE_STAGE_UPDATE: &str = "stage_update";

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = scheduled_messages)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub chat_user_id: i64,
    pub message_type: String,
    pub payload: serde_json::Value,
    pub scheduled_for: NaiveDateTime,
    pub sent: bool,
    pub sent_at: Option<NaiveDateTime>,
    pub attempts: i32,
    /// Set once delivery is abandoned; such rows are never due again.
    pub failed_at: Option<NaiveDateTime>,
}

impl ScheduledMessage {
    pub fn text(&self) -> Option<&str> {
        self.payload.get("text").and_then(|value| value.as_str())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduled_messages)]
pub struct NewScheduledMessage {
    pub id: Uuid,
    pub chat_user_id: i64,
    pub message_type: String,
    pub payload: serde_json::Value,
    pub scheduled_for: NaiveDateTime,
}
