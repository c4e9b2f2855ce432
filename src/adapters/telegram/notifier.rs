//! Telegram Bot API notifier.
//!
//! Sends `sendMessage` and `sendDocument` calls. The token is part of the
//! request path, so request errors are stripped of their URL before they
//! are surfaced.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::foundation::ExternalUserId;
use crate::ports::{NotificationError, Notifier};

/// Longer timeout for file uploads.
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the Telegram notifier.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    bot_token: Option<Secret<String>>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: Option<String>) -> Self {
        Self {
            bot_token: bot_token
                .filter(|token| !token.trim().is_empty())
                .map(Secret::new),
            api_base_url: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    fn method_url(&self, method: &str) -> Result<String, NotificationError> {
        let token = self
            .bot_token
            .as_ref()
            .ok_or(NotificationError::NotConfigured)?;
        Ok(format!(
            "{}/bot{}/{}",
            self.api_base_url,
            token.expose_secret(),
            method
        ))
    }
}

/// [`Notifier`] backed by the Telegram Bot API.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    /// # Errors
    ///
    /// `Network` if the HTTP client cannot be built.
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Network(format!("client setup failed: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), NotificationError> {
        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Http {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, to: ExternalUserId, text: &str) -> Result<(), NotificationError> {
        let url = self.config.method_url("sendMessage")?;
        self.send(self.client.post(url).json(&SendMessageRequest {
            chat_id: to.as_i64(),
            text,
        }))
        .await?;

        debug!(chat_id = %to, "Message sent");
        Ok(())
    }

    async fn send_document(
        &self,
        to: ExternalUserId,
        filename: &str,
        content: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), NotificationError> {
        let url = self.config.method_url("sendDocument")?;

        let mut form = Form::new().text("chat_id", to.as_i64().to_string());
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            form = form.text("caption", caption.to_string());
        }
        form = form.part(
            "document",
            Part::bytes(content).file_name(filename.to_string()),
        );

        self.send(
            self.client
                .post(url)
                .multipart(form)
                .timeout(DOCUMENT_TIMEOUT),
        )
        .await?;

        debug!(chat_id = %to, filename, "Document sent");
        Ok(())
    }
}
