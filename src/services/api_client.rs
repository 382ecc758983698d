use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::errors::{GoldbergError, Result};

/// Browser-like agent; the store and SteamDB reject bare library agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const TOOL_USER_AGENT: &str = concat!("goldberg-config/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agent {
    Browser,
    Tool,
}

impl Agent {
    fn header(&self) -> HeaderValue {
        match self {
            Agent::Browser => HeaderValue::from_static(BROWSER_USER_AGENT),
            Agent::Tool => HeaderValue::from_static(TOOL_USER_AGENT),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(6))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    fn request(&self, url: &str, agent: Agent) -> RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, agent.header())
            .header(ACCEPT, HeaderValue::from_static("*/*"))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, agent: Agent) -> Result<T> {
        let response = self.send(url, agent).await?;
        let value = response.json::<T>().await?;
        Ok(value)
    }

    pub async fn get_text(&self, url: &str, agent: Agent) -> Result<String> {
        let response = self.send(url, agent).await?;
        Ok(response.text().await?)
    }

    /// Send a GET and fail on non-success status; the body is left unread for streaming.
    pub async fn send(&self, url: &str, agent: Agent) -> Result<Response> {
        let response = self.request(url, agent).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GoldbergError::Http(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&text, 200)
            )));
        }
        Ok(response)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let short = truncate(&body, 200);
        assert_eq!(short.chars().count(), 201);
        assert_eq!(truncate("not found", 200), "not found");
    }
}
