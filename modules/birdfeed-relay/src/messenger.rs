//! Outbound delivery. Media failures degrade to text; only the final
//! text-only send may propagate an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use telegram_client::TelegramClient;

use crate::session::{SessionEvent, SessionState};

/// Server-side cap on photo captions.
const CAPTION_LIMIT: usize = 1024;

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn deliver(
        &self,
        label: &str,
        display_timestamp: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<()>;
}

/// How a post will be sent, given its size and media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPlan {
    Text,
    PhotoWithCaption,
    PhotoThenText,
}

pub fn plan_delivery(body_chars: usize, has_image: bool) -> DeliveryPlan {
    if !has_image {
        DeliveryPlan::Text
    } else if body_chars <= CAPTION_LIMIT {
        DeliveryPlan::PhotoWithCaption
    } else {
        DeliveryPlan::PhotoThenText
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn compose_header(label: &str, display_timestamp: &str) -> String {
    if display_timestamp.is_empty() {
        format!("<b>{}</b>", html_escape(label))
    } else {
        format!(
            "<b>{}</b> · {}",
            html_escape(label),
            html_escape(display_timestamp)
        )
    }
}

pub fn compose_body(label: &str, display_timestamp: &str, text: &str) -> String {
    format!(
        "{}\n\n{}",
        compose_header(label, display_timestamp),
        html_escape(text)
    )
}

pub struct TelegramMessenger {
    client: TelegramClient,
    chat_id: i64,
}

impl TelegramMessenger {
    /// Resolve the destination chat, driving the session state machine.
    /// Anything short of `Ready` is fatal.
    pub async fn connect(client: TelegramClient, destination: &str) -> Result<Self> {
        let session = SessionState::Idle.apply(SessionEvent::Connect);

        let session = match client.get_chat(destination).await {
            Ok(chat) => session.apply(SessionEvent::Resolved(chat.id)),
            Err(e) if e.is_auth() => session.apply(SessionEvent::AuthRejected(e.to_string())),
            Err(e) => session.apply(SessionEvent::Lost(e.to_string())),
        };

        match session {
            SessionState::Ready { chat_id } => {
                info!(destination, chat_id, "Destination resolved");
                Ok(Self { client, chat_id })
            }
            SessionState::AuthFailed(reason) => {
                anyhow::bail!("Messaging authentication rejected: {reason}")
            }
            other => anyhow::bail!("Could not resolve destination {destination}: {other:?}"),
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn deliver(
        &self,
        label: &str,
        display_timestamp: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<()> {
        let body = compose_body(label, display_timestamp, text);

        if let Some(image) = image_url {
            match plan_delivery(body.chars().count(), true) {
                DeliveryPlan::PhotoWithCaption => {
                    match self.client.send_photo(self.chat_id, image, &body).await {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            warn!(image, error = %e, "Photo send failed, falling back to text")
                        }
                    }
                }
                DeliveryPlan::PhotoThenText => {
                    let header = compose_header(label, display_timestamp);
                    match self.client.send_photo(self.chat_id, image, &header).await {
                        Ok(()) => {
                            return self
                                .client
                                .send_message(self.chat_id, &body)
                                .await
                                .context("Text send after photo failed");
                        }
                        Err(e) => {
                            warn!(image, error = %e, "Photo send failed, falling back to text")
                        }
                    }
                }
                DeliveryPlan::Text => unreachable!("plan with image cannot be text-only"),
            }
        }

        self.client
            .send_message(self.chat_id, &body)
            .await
            .context("Text send failed")
    }
}
