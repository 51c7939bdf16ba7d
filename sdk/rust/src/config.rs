//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SessionError;

/// Where and how a session connects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Edge origin, e.g. `https://chat.example.com`. `http(s)` maps to `ws(s)`.
    pub base_url: String,
    /// Chat room the session joins.
    pub chat_code: String,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>, chat_code: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            chat_code: chat_code.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// `{base}/ws/chat/{chat_code}/?session_token={token}`
    pub fn socket_url(&self, token: &str) -> Result<Url, SessionError> {
        if self.chat_code.is_empty() {
            return Err(SessionError::EmptyChatCode);
        }
        if matches!(self.chat_code.as_str(), "." | "..")
            || self.chat_code.contains(['/', '\\'])
        {
            return Err(SessionError::InvalidChatCode(self.chat_code.clone()));
        }

        let mut url = Url::parse(&self.base_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(SessionError::UnsupportedScheme(other.to_owned())),
        };
        url.set_scheme(scheme)
            .map_err(|()| SessionError::UnsupportedScheme(scheme.to_owned()))?;
        url.set_path(&format!("/ws/chat/{}/", self.chat_code));
        url.set_query(None);
        url.query_pairs_mut().append_pair("session_token", token);
        Ok(url)
    }
}

/// Automatic reconnection after abnormal closure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Fixed wait before each attempt.
    pub delay_ms: u64,
    pub limit: ReconnectLimit,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 3000,
            limit: ReconnectLimit::MaxAttempts(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt may follow `attempts` consecutive failures.
    pub fn allows(&self, attempts: u32) -> bool {
        match self.limit {
            ReconnectLimit::MaxAttempts(max) => attempts < max,
            ReconnectLimit::Unlimited => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectLimit {
    MaxAttempts(u32),
    Unlimited,
}
