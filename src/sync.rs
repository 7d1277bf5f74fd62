//! Inbound CRM deal events: correlate to a user, record the stage, notify.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crm::map_stage;
use crate::locks::UserLocks;
use crate::messages;
use crate::models::{NewScheduledMessage, MESSAGE_STAGE_UPDATE};
use crate::store::{Store, StoreResult};
use crate::telegram::Notifier;
use crate::utils::json::{id_from_value, optional_string};

pub const DEAL_UPDATE_EVENT: &str = "ONCRMDEALUPDATE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed CRM event: {0}")]
pub struct MalformedEvent(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealEvent {
    DealChanged { deal_id: i64, stage: Option<String> },
    Other(String),
}

impl DealEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, MalformedEvent> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| MalformedEvent(format!("body is not JSON: {err}")))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, MalformedEvent> {
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedEvent("missing event name".into()))?;

        if !event.eq_ignore_ascii_case(DEAL_UPDATE_EVENT) {
            return Ok(DealEvent::Other(event.to_string()));
        }

        let fields = value
            .pointer("/data/FIELDS")
            .ok_or_else(|| MalformedEvent("missing data.FIELDS".into()))?;
        let deal_id = id_from_value(fields.get("ID"))
            .map_err(|err| MalformedEvent(format!("data.FIELDS.ID: {err}")))?;
        let stage = optional_string(fields.get("STAGE_ID"))
            .map_err(|err| MalformedEvent(format!("data.FIELDS.STAGE_ID: {err}")))?;

        Ok(DealEvent::DealChanged { deal_id, stage })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Ignored,
    StageUpdated {
        chat_user_id: i64,
        stage: String,
        notified: bool,
    },
    UserNotFound {
        deal_id: i64,
    },
}

#[derive(Clone)]
pub struct StageSyncGateway {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    locks: UserLocks,
}

impl StageSyncGateway {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, locks: UserLocks) -> Self {
        Self {
            store,
            notifier,
            locks,
        }
    }

    /// Last writer wins: events carry no version, so a late event can
    /// move the stage backwards.
    pub async fn on_deal_changed(&self, event: DealEvent) -> StoreResult<SyncOutcome> {
        let (deal_id, stage) = match event {
            DealEvent::DealChanged {
                deal_id,
                stage: Some(stage),
            } => (deal_id, stage),
            DealEvent::DealChanged { deal_id, stage: None } => {
                info!(deal_id, "deal event without stage");
                return Ok(SyncOutcome::Ignored);
            }
            DealEvent::Other(name) => {
                info!(event = %name, "ignoring CRM event");
                return Ok(SyncOutcome::Ignored);
            }
        };

        let Some(user) = self.store.find_user_by_deal(deal_id).await? else {
            warn!(deal_id, "no user linked to deal");
            return Ok(SyncOutcome::UserNotFound { deal_id });
        };
        let chat_user_id = user.chat_user_id;

        {
            let _guard = self.locks.acquire(chat_user_id).await;
            self.store.set_stage(chat_user_id, &stage).await?;
        }
        info!(chat_user_id, deal_id, stage = %stage, "stage updated");

        let text = messages::stage_updated(&map_stage(&stage));
        let notified = match self.notifier.send_message(chat_user_id, &text).await {
            Ok(()) => true,
            Err(err) => {
                warn!(chat_user_id, error = %err, "stage notification failed, deferring");
                let deferred = NewScheduledMessage {
                    id: Uuid::new_v4(),
                    chat_user_id,
                    message_type: MESSAGE_STAGE_UPDATE.to_string(),
                    payload: json!({ "text": text, "stage": stage }),
                    scheduled_for: Utc::now().naive_utc(),
                };
                if let Err(err) = self.store.schedule_message(deferred).await {
                    warn!(chat_user_id, error = %err, "failed to defer stage notification");
                }
                false
            }
        };

        Ok(SyncOutcome::StageUpdated {
            chat_user_id,
            stage,
            notified,
        })
    }
}

/// Failed deliveries are retried this many times in total before the
/// message is abandoned.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 6;

const RETRY_BASE_MINUTES: i64 = 5;

/// Delay before the next try after `attempts` failures: 5, 10, 20, 40 and
/// 80 minutes.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = u32::try_from(attempts.saturating_sub(1)).unwrap_or(0).min(8);
    Duration::minutes(RETRY_BASE_MINUTES * (1_i64 << exponent))
}

/// Sends due deferred messages; returns how many were delivered.
///
/// A failed message moves out of the due window until its retry time, so
/// undeliverable chats never hold back the rest of the queue.
pub async fn deliver_due_messages(
    store: &dyn Store,
    notifier: &dyn Notifier,
    limit: i64,
) -> StoreResult<usize> {
    let mut delivered = 0;
    for message in store.due_messages(limit).await? {
        let Some(text) = message.text() else {
            warn!(message_id = %message.id, "scheduled message has no text, skipping");
            store.mark_message_sent(message.id).await?;
            continue;
        };
        match notifier.send_message(message.chat_user_id, text).await {
            Ok(()) => {
                store.mark_message_sent(message.id).await?;
                delivered += 1;
            }
            Err(err) => {
                let attempts = message.attempts + 1;
                let retry_at = (attempts < MAX_DELIVERY_ATTEMPTS)
                    .then(|| Utc::now().naive_utc() + retry_delay(attempts));
                match retry_at {
                    Some(retry_at) => warn!(
                        message_id = %message.id,
                        attempts,
                        retry_at = %retry_at,
                        error = %err,
                        "delivery failed, will retry"
                    ),
                    None => warn!(
                        message_id = %message.id,
                        attempts,
                        error = %err,
                        "delivery failed, giving up"
                    ),
                }
                store.record_delivery_failure(message.id, retry_at).await?;
            }
        }
    }
    Ok(delivered)
}
