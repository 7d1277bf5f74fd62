//! Client for the external case-management system (Bitrix24 REST webhook).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::utils::json::{id_from_value, optional_string};

pub mod stages;

pub use stages::{map_stage, roadmap, RoadmapStep, StageDisplay};

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("CRM returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("CRM API error: {0}")]
    Api(String),
    #[error("malformed CRM payload: {0}")]
    Malformed(String),
}

/// The external case linked to a phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub contact_id: i64,
    pub deal_id: i64,
    pub stage: Option<String>,
    pub contact_name: String,
}

#[async_trait]
pub trait CrmLinker: Send + Sync + 'static {
    /// Transport and payload failures are logged and reported as `None`,
    /// indistinguishable from a phone with no case.
    async fn find_case(&self, phone: &str) -> Option<CaseRecord>;

    /// Best-effort write of a single deal field.
    async fn update_field(&self, deal_id: i64, field_code: &str, value: &str) -> bool;
}

pub struct BitrixClient {
    client: reqwest::Client,
    base_url: String,
    category_id: i64,
}

impl BitrixClient {
    pub fn new(base_url: &str, category_id: i64, timeout: Duration) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            category_id,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, CrmError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self.client.post(&url).json(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        if let Some(error) = envelope.get("error") {
            let description = envelope
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(CrmError::Api(format!("{error} {description}").trim().to_string()));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| CrmError::Malformed("response has no result".into()))
    }

    async fn lookup_case(&self, phone: &str) -> Result<Option<CaseRecord>, CrmError> {
        let crm_phone = crate::onboarding::validate::crm_phone(phone);

        let contacts = self
            .call(
                "crm.contact.list",
                json!({
                    "filter": { "PHONE": crm_phone },
                    "select": ["ID", "NAME", "LAST_NAME", "PHONE"],
                }),
            )
            .await?;
        let Some(contact) = first_row(&contacts)? else {
            info!(phone = %crm_phone, "no CRM contact for phone");
            return Ok(None);
        };
        let contact_id = id_from_value(contact.get("ID")).map_err(CrmError::Malformed)?;

        let deals = self
            .call(
                "crm.deal.list",
                json!({
                    "filter": { "CONTACT_ID": contact_id, "CATEGORY_ID": self.category_id },
                    "select": ["ID", "TITLE", "STAGE_ID", "OPPORTUNITY", "CURRENCY_ID"],
                }),
            )
            .await?;
        let Some(deal) = first_row(&deals)? else {
            info!(contact_id, category_id = self.category_id, "no deal in pipeline for contact");
            return Ok(None);
        };
        let deal_id = id_from_value(deal.get("ID")).map_err(CrmError::Malformed)?;
        let stage = optional_string(deal.get("STAGE_ID")).map_err(CrmError::Malformed)?;

        let contact_name = ["NAME", "LAST_NAME"]
            .iter()
            .filter_map(|key| contact.get(*key).and_then(Value::as_str))
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        info!(contact_id, deal_id, stage = ?stage, "linked CRM case");
        Ok(Some(CaseRecord {
            contact_id,
            deal_id,
            stage,
            contact_name,
        }))
    }
}

/// The CRM's own ordering is authoritative: the first row wins.
fn first_row(result: &Value) -> Result<Option<&Value>, CrmError> {
    match result {
        Value::Array(rows) => Ok(rows.first()),
        Value::Null => Ok(None),
        other => Err(CrmError::Malformed(format!("expected a list, got {other}"))),
    }
}

#[async_trait]
impl CrmLinker for BitrixClient {
    async fn find_case(&self, phone: &str) -> Option<CaseRecord> {
        match self.lookup_case(phone).await {
            Ok(found) => found,
            Err(err) => {
                error!(error = %err, "CRM case lookup failed");
                None
            }
        }
    }

    async fn update_field(&self, deal_id: i64, field_code: &str, value: &str) -> bool {
        let params = json!({
            "id": deal_id,
            "fields": { field_code: value },
        });
        match self.call("crm.deal.update", params).await {
            Ok(_) => true,
            Err(err) => {
                warn!(deal_id, field = field_code, error = %err, "CRM field update failed");
                false
            }
        }
    }
}
