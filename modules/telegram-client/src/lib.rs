pub mod error;

pub use error::{Result, TelegramError};

use std::time::Duration;

use serde::Deserialize;

/// A resolved chat, as returned by `getChat`.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

/// Minimal Bot API client. Only the methods the relay needs.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(&format!("https://api.telegram.org/bot{token}"))
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body: ApiResponse<T> = resp.json().await?;

        if !body.ok {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description: body
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        body.result.ok_or(TelegramError::Api {
            status: status.as_u16(),
            description: "ok response without result".to_string(),
        })
    }

    /// Resolve a chat by `@username` or numeric id string.
    pub async fn get_chat(&self, chat: &str) -> Result<Chat> {
        self.call("getChat", serde_json::json!({ "chat_id": chat }))
            .await
    }

    /// Send an HTML-formatted text message with link previews disabled.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(())
    }

    /// Send a photo by URL with an HTML caption.
    pub async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendPhoto",
                serde_json::json!({
                    "chat_id": chat_id,
                    "photo": photo_url,
                    "caption": caption,
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        Ok(())
    }
}
