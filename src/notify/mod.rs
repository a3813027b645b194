//! Outbound notifications
//!
//! Every message is best-effort: [`send_best_effort`] logs a failed delivery
//! and carries on, so a broken chat token never stops a bot.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ExchangeKeys;
use crate::error::{TradingError, TradingResult};

pub const LINE_NOTIFY_URL: &str = "https://notify-api.line.me/api/notify";

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &str) -> TradingResult<()>;
}

/// Send and swallow the error after logging it
pub async fn send_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        warn!("⚠️  {} notification failed: {}", notifier.name(), e);
    }
}

/// Pick LINE when a token is configured, otherwise log the messages
pub fn from_keys(keys: &ExchangeKeys) -> TradingResult<Box<dyn Notifier>> {
    match keys.line_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Ok(Box::new(LineNotifier::new(token)?)),
        None => {
            info!("No lineToken configured, notifications go to the log");
            Ok(Box::new(LogNotifier))
        }
    }
}

/// LINE Notify push channel
pub struct LineNotifier {
    client: reqwest::Client,
    token: String,
    endpoint: String,
}

impl LineNotifier {
    pub fn new(token: impl Into<String>) -> TradingResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            token: token.into(),
            endpoint: LINE_NOTIFY_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    fn name(&self) -> &str {
        "line"
    }

    async fn send(&self, message: &str) -> TradingResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&[("message", message)])
            .send()
            .await
            .map_err(|e| TradingError::NotificationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TradingError::NotificationFailed(format!("HTTP {}: {}", status, body)));
        }

        debug!("Pushed {} bytes to LINE", message.len());
        Ok(())
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &str) -> TradingResult<()> {
        info!("📣 {}", message);
        Ok(())
    }
}

/// Keeps messages in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
    failing: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, message: &str) -> TradingResult<()> {
        if self.failing {
            return Err(TradingError::NotificationFailed("memory notifier set to fail".to_string()));
        }
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_notifier_posts_form_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/notify")
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::UrlEncoded("message".into(), "hello bot".into()))
            .with_status(200)
            .with_body(r#"{"status":200,"message":"ok"}"#)
            .create_async()
            .await;

        let notifier = LineNotifier::new("tok")
            .unwrap()
            .with_endpoint(format!("{}/api/notify", server.url()));
        notifier.send("hello bot").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_line_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/notify")
            .with_status(401)
            .with_body(r#"{"status":401,"message":"Invalid access token"}"#)
            .create_async()
            .await;

        let notifier = LineNotifier::new("bad")
            .unwrap()
            .with_endpoint(format!("{}/api/notify", server.url()));
        let err = notifier.send("x").await.unwrap_err();
        assert!(matches!(err, TradingError::NotificationFailed(_)));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let notifier = MemoryNotifier::failing();
        send_best_effort(&notifier, "lost").await;
        assert!(notifier.messages().is_empty());
    }
}
