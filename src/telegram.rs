//! Bot API transport: outbound messages, file downloads and the inbound
//! update shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bot API error: {0}")]
    Api(String),
}

/// One inline keyboard button; pressing it sends `callback_data` back as a
/// callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;

    /// Sends `text` with the buttons laid out in a single row.
    async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<(), NotifyError>;

    /// Acknowledges a callback query so the client stops its spinner.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait FileSource: Send + Sync + 'static {
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, NotifyError>;
}

pub struct TelegramClient {
    client: reqwest::Client,
    method_base: String,
    file_base: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let api_url = api_url.trim_end_matches('/');
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            method_base: format!("{api_url}/bot{token}"),
            file_base: format!("{api_url}/file/bot{token}"),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, NotifyError> {
        let url = format!("{}/{method}", self.method_base);
        let response: ApiResponse = self
            .client
            .post(url)
            .json(&params)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(NotifyError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        Ok(response.result)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        debug!(chat_id, "sent chat message");
        Ok(())
    }

    async fn send_with_buttons(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[InlineButton],
    ) -> Result<(), NotifyError> {
        let row: Vec<Value> = buttons
            .iter()
            .map(|button| json!({ "text": button.text, "callback_data": button.callback_data }))
            .collect();
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "reply_markup": { "inline_keyboard": [row] },
            }),
        )
        .await?;
        debug!(chat_id, buttons = buttons.len(), "sent chat message with buttons");
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), NotifyError> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FileSource for TelegramClient {
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, NotifyError> {
        let file = self.call("getFile", json!({ "file_id": file_id })).await?;
        let path = file
            .get("file_path")
            .and_then(Value::as_str)
            .ok_or_else(|| NotifyError::Api(format!("file {file_id} has no download path")))?;

        let bytes = self
            .client
            .get(format!("{}/{path}", self.file_base))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

/// A pressed inline button.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl CallbackQuery {
    /// Replies go to the chat holding the button, or to the presser.
    pub fn chat_id(&self) -> i64 {
        self.message
            .as_ref()
            .map_or(self.from.id, |message| message.chat.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub document: Option<DocumentFile>,
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    /// The chat user id: the sender when present, otherwise the chat itself.
    pub fn user_id(&self) -> i64 {
        self.from.as_ref().map_or(self.chat.id, |sender| sender.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DocumentFile {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_update() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": 500, "type": "private" },
                "from": { "id": 501, "is_bot": false, "first_name": "Іван" },
                "text": "/start"
            }
        }))
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.user_id(), 501);
        assert_eq!(message.text.as_deref(), Some("/start"));
    }

    #[test]
    fn parses_callback_query() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 12,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 501, "is_bot": false, "first_name": "Іван" },
                "message": { "message_id": 3, "chat": { "id": 500 }, "text": "🎤 Вебінар" },
                "chat_instance": "1",
                "data": "conf_register_abc"
            }
        }))
        .unwrap();
        assert!(update.message.is_none());
        let query = update.callback_query.unwrap();
        assert_eq!(query.from.id, 501);
        assert_eq!(query.chat_id(), 500);
        assert_eq!(query.data.as_deref(), Some("conf_register_abc"));
    }

    #[test]
    fn parses_photo_update() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 11,
            "message": {
                "chat": { "id": 500 },
                "photo": [{ "file_id": "small" }, { "file_id": "large" }]
            }
        }))
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.user_id(), 500);
        assert_eq!(message.photo.unwrap().last().unwrap().file_id, "large");
    }
}
