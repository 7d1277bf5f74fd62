use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ClientCategory, Conference, Conversation, Document, NewConference, NewDocument,
    NewScheduledMessage, NewUser, ScheduledMessage, User,
};

pub mod pg;

pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("phone number {0} is already registered")]
    DuplicatePhone(String),
    #[error("chat user {0} is already registered")]
    DuplicateUser(i64),
    #[error("chat user {0} not found")]
    UserNotFound(i64),
    #[error("conference {0} not found")]
    ConferenceNotFound(Uuid),
    #[error("blocking task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable record of users, their answers, documents and CRM linkage.
///
/// Mutations are enumerated operations; there is no generic field update.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_user(&self, chat_user_id: i64) -> StoreResult<Option<User>>;

    async fn find_user_by_deal(&self, deal_id: i64) -> StoreResult<Option<User>>;

    /// Fails with `DuplicatePhone` or `DuplicateUser` without persisting anything.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    async fn set_stage(&self, chat_user_id: i64, stage: &str) -> StoreResult<()>;

    async fn set_category(&self, chat_user_id: i64, category: ClientCategory) -> StoreResult<()>;

    async fn set_archive_folder(&self, chat_user_id: i64, folder_id: &str) -> StoreResult<()>;

    /// Returns the new opt-out value.
    async fn toggle_conference_opt_out(&self, chat_user_id: i64) -> StoreResult<bool>;

    async fn upsert_answer(
        &self,
        chat_user_id: i64,
        question_number: u8,
        answer_text: &str,
    ) -> StoreResult<()>;

    async fn answers(&self, chat_user_id: i64) -> StoreResult<BTreeMap<u8, String>>;

    async fn add_document(&self, document: NewDocument) -> StoreResult<Document>;

    async fn documents(&self, chat_user_id: i64) -> StoreResult<Vec<Document>>;

    async fn get_conversation(&self, chat_user_id: i64) -> StoreResult<Option<Conversation>>;

    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    async fn create_conference(&self, conference: NewConference) -> StoreResult<Conference>;

    /// Ids of the conferences the user is registered for.
    async fn conference_registrations(&self, chat_user_id: i64) -> StoreResult<Vec<Uuid>>;

    /// Active conferences starting after now, earliest first, with participant counts.
    async fn upcoming_conferences(&self) -> StoreResult<Vec<(Conference, i64)>>;

    /// Returns `true` when a new registration was written, `false` if it already existed.
    async fn register_for_conference(
        &self,
        conference_id: Uuid,
        chat_user_id: i64,
    ) -> StoreResult<bool>;

    async fn schedule_message(&self, message: NewScheduledMessage) -> StoreResult<()>;

    async fn due_messages(&self, limit: i64) -> StoreResult<Vec<ScheduledMessage>>;

    async fn mark_message_sent(&self, message_id: Uuid) -> StoreResult<()>;

    /// Counts a failed delivery. With `retry_at` the message becomes due
    /// again at that time; without it the message is abandoned.
    async fn record_delivery_failure(
        &self,
        message_id: Uuid,
        retry_at: Option<NaiveDateTime>,
    ) -> StoreResult<()>;
}
