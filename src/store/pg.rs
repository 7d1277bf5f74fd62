use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{
    Answer, ClientCategory, Conference, Conversation, ConversationRow, ConversationUpsert,
    Document, NewAnswer, NewConference, NewConferenceRegistration, NewDocument,
    NewScheduledMessage, NewUser, ScheduledMessage, User,
};
use crate::schema::{
    answers, conference_registrations, conferences, conversations, documents, scheduled_messages,
    users,
};

use super::{Store, StoreError, StoreResult};

const PHONE_UNIQUE_INDEX: &str = "users_phone_number_key";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Pool(err.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

fn ensure_updated(rows: usize, chat_user_id: i64) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::UserNotFound(chat_user_id));
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, chat_user_id: i64) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            let user = users::table
                .find(chat_user_id)
                .first::<User>(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn find_user_by_deal(&self, deal_id: i64) -> StoreResult<Option<User>> {
        self.with_conn(move |conn| {
            let user = users::table
                .filter(users::crm_deal_id.eq(deal_id))
                .order(users::registered_at.asc())
                .first::<User>(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.with_conn(move |conn| {
            conn.transaction(|conn| {
                match diesel::insert_into(users::table)
                    .values(&user)
                    .execute(conn)
                {
                    Ok(_) => {}
                    Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                        return Err(if info.constraint_name() == Some(PHONE_UNIQUE_INDEX) {
                            StoreError::DuplicatePhone(user.phone_number.clone())
                        } else {
                            StoreError::DuplicateUser(user.chat_user_id)
                        });
                    }
                    Err(err) => return Err(StoreError::from(err)),
                }

                let created = users::table.find(user.chat_user_id).first::<User>(conn)?;
                Ok(created)
            })
        })
        .await
    }

    async fn set_stage(&self, chat_user_id: i64, stage: &str) -> StoreResult<()> {
        let stage = stage.to_string();
        self.with_conn(move |conn| {
            conn.transaction(|conn| {
                let locked = users::table
                    .find(chat_user_id)
                    .select(users::chat_user_id)
                    .for_update()
                    .first::<i64>(conn)
                    .optional()?;
                if locked.is_none() {
                    return Err(StoreError::UserNotFound(chat_user_id));
                }

                diesel::update(users::table.find(chat_user_id))
                    .set(users::current_stage.eq(Some(stage.as_str())))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn set_category(&self, chat_user_id: i64, category: ClientCategory) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let rows = diesel::update(users::table.find(chat_user_id))
                .set(users::client_category.eq(Some(category.as_str())))
                .execute(conn)?;
            ensure_updated(rows, chat_user_id)
        })
        .await
    }

    async fn set_archive_folder(&self, chat_user_id: i64, folder_id: &str) -> StoreResult<()> {
        let folder_id = folder_id.to_string();
        self.with_conn(move |conn| {
            let rows = diesel::update(users::table.find(chat_user_id))
                .set(users::archive_folder_id.eq(Some(folder_id.as_str())))
                .execute(conn)?;
            ensure_updated(rows, chat_user_id)
        })
        .await
    }

    async fn toggle_conference_opt_out(&self, chat_user_id: i64) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            conn.transaction(|conn| {
                let current = users::table
                    .find(chat_user_id)
                    .select(users::conference_opt_out)
                    .for_update()
                    .first::<bool>(conn)
                    .optional()?
                    .ok_or(StoreError::UserNotFound(chat_user_id))?;

                diesel::update(users::table.find(chat_user_id))
                    .set(users::conference_opt_out.eq(!current))
                    .execute(conn)?;
                Ok(!current)
            })
        })
        .await
    }

    async fn upsert_answer(
        &self,
        chat_user_id: i64,
        question_number: u8,
        answer_text: &str,
    ) -> StoreResult<()> {
        let answer_text = answer_text.to_string();
        self.with_conn(move |conn| {
            let new_answer = NewAnswer {
                chat_user_id,
                question_number: i32::from(question_number),
                answer_text: &answer_text,
            };
            diesel::insert_into(answers::table)
                .values(&new_answer)
                .on_conflict((answers::chat_user_id, answers::question_number))
                .do_update()
                .set(answers::answer_text.eq(excluded(answers::answer_text)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn answers(&self, chat_user_id: i64) -> StoreResult<BTreeMap<u8, String>> {
        self.with_conn(move |conn| {
            let rows: Vec<Answer> = answers::table
                .filter(answers::chat_user_id.eq(chat_user_id))
                .order(answers::question_number.asc())
                .load(conn)?;

            Ok(rows
                .into_iter()
                .filter_map(|answer| {
                    u8::try_from(answer.question_number)
                        .ok()
                        .map(|number| (number, answer.answer_text))
                })
                .collect())
        })
        .await
    }

    async fn add_document(&self, document: NewDocument) -> StoreResult<Document> {
        self.with_conn(move |conn| {
            diesel::insert_into(documents::table)
                .values(&document)
                .execute(conn)?;
            let stored = documents::table.find(document.id).first::<Document>(conn)?;
            Ok(stored)
        })
        .await
    }

    async fn documents(&self, chat_user_id: i64) -> StoreResult<Vec<Document>> {
        self.with_conn(move |conn| {
            let rows = documents::table
                .filter(documents::chat_user_id.eq(chat_user_id))
                .order(documents::uploaded_at.asc())
                .load::<Document>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn get_conversation(&self, chat_user_id: i64) -> StoreResult<Option<Conversation>> {
        self.with_conn(move |conn| {
            let row = conversations::table
                .find(chat_user_id)
                .first::<ConversationRow>(conn)
                .optional()?;

            Ok(row.and_then(|row| {
                let state = row.state.clone();
                let conversation = row.into_conversation();
                if conversation.is_none() {
                    warn!(chat_user_id, %state, "discarding unreadable conversation state");
                }
                conversation
            }))
        })
        .await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let conversation = conversation.clone();
        self.with_conn(move |conn| {
            let upsert = ConversationUpsert::from_conversation(&conversation, Utc::now().naive_utc());
            diesel::insert_into(conversations::table)
                .values(&upsert)
                .on_conflict(conversations::chat_user_id)
                .do_update()
                .set(&upsert)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn create_conference(&self, conference: NewConference) -> StoreResult<Conference> {
        self.with_conn(move |conn| {
            diesel::insert_into(conferences::table)
                .values(&conference)
                .execute(conn)?;
            let stored = conferences::table
                .find(conference.id)
                .first::<Conference>(conn)?;
            Ok(stored)
        })
        .await
    }

    async fn conference_registrations(&self, chat_user_id: i64) -> StoreResult<Vec<Uuid>> {
        self.with_conn(move |conn| {
            let ids = conference_registrations::table
                .filter(conference_registrations::chat_user_id.eq(chat_user_id))
                .select(conference_registrations::conference_id)
                .load::<Uuid>(conn)?;
            Ok(ids)
        })
        .await
    }

    async fn upcoming_conferences(&self) -> StoreResult<Vec<(Conference, i64)>> {
        self.with_conn(move |conn| {
            let now = Utc::now().naive_utc();
            let list: Vec<Conference> = conferences::table
                .filter(conferences::is_active.eq(true))
                .filter(conferences::starts_at.gt(now))
                .order(conferences::starts_at.asc())
                .load(conn)?;

            let ids: Vec<Uuid> = list.iter().map(|conference| conference.id).collect();
            let counts: HashMap<Uuid, i64> = conference_registrations::table
                .filter(conference_registrations::conference_id.eq_any(&ids))
                .group_by(conference_registrations::conference_id)
                .select((conference_registrations::conference_id, count_star()))
                .load::<(Uuid, i64)>(conn)?
                .into_iter()
                .collect();

            Ok(list
                .into_iter()
                .map(|conference| {
                    let count = counts.get(&conference.id).copied().unwrap_or(0);
                    (conference, count)
                })
                .collect())
        })
        .await
    }

    async fn register_for_conference(
        &self,
        conference_id: Uuid,
        chat_user_id: i64,
    ) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let conference = conferences::table
                .find(conference_id)
                .select(conferences::id)
                .first::<Uuid>(conn)
                .optional()?;
            if conference.is_none() {
                return Err(StoreError::ConferenceNotFound(conference_id));
            }

            let user = users::table
                .find(chat_user_id)
                .select(users::chat_user_id)
                .first::<i64>(conn)
                .optional()?;
            if user.is_none() {
                return Err(StoreError::UserNotFound(chat_user_id));
            }

            let inserted = diesel::insert_into(conference_registrations::table)
                .values(&NewConferenceRegistration {
                    conference_id,
                    chat_user_id,
                })
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn schedule_message(&self, message: NewScheduledMessage) -> StoreResult<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(scheduled_messages::table)
                .values(&message)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn due_messages(&self, limit: i64) -> StoreResult<Vec<ScheduledMessage>> {
        self.with_conn(move |conn| {
            let rows = scheduled_messages::table
                .filter(scheduled_messages::sent.eq(false))
                .filter(scheduled_messages::failed_at.is_null())
                .filter(scheduled_messages::scheduled_for.le(Utc::now().naive_utc()))
                .order(scheduled_messages::scheduled_for.asc())
                .limit(limit)
                .load::<ScheduledMessage>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn mark_message_sent(&self, message_id: Uuid) -> StoreResult<()> {
        self.with_conn(move |conn| {
            diesel::update(scheduled_messages::table.find(message_id))
                .set((
                    scheduled_messages::sent.eq(true),
                    scheduled_messages::sent_at.eq(Some(Utc::now().naive_utc())),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn record_delivery_failure(
        &self,
        message_id: Uuid,
        retry_at: Option<NaiveDateTime>,
    ) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let target = scheduled_messages::table.find(message_id);
            let attempts = scheduled_messages::attempts.eq(scheduled_messages::attempts + 1);
            match retry_at {
                Some(retry_at) => diesel::update(target)
                    .set((attempts, scheduled_messages::scheduled_for.eq(retry_at)))
                    .execute(conn)?,
                None => diesel::update(target)
                    .set((
                        attempts,
                        scheduled_messages::failed_at.eq(Some(Utc::now().naive_utc())),
                    ))
                    .execute(conn)?,
            };
            Ok(())
        })
        .await
    }
}
