//! HTTP client for the relay's `/chat` and `/models` endpoints.

use loco_core::llm::{ChatError, CompletionRequest};
use providers::http::{map_reqwest_err, map_status_err};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .no_proxy()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(&self, req: &CompletionRequest) -> Result<reqwest::Response, ChatError> {
        let url = format!("{}/chat", self.base_url);
        let resp = self
            .http
            .post(url)
            .json(req)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.ok();
            error!(target:"chat::relay","relay non-200 status={} body={:?}", status, body);
            return Err(map_status_err(status, body));
        }
        Ok(resp)
    }

    /// Buffered completion; returns the assistant reply.
    pub async fn complete(&self, req: &CompletionRequest) -> Result<String, ChatError> {
        let mut req = req.clone();
        req.stream = false;
        let v: serde_json::Value = self
            .post_chat(&req)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        v["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChatError::Protocol("relay reply has no `response` field".into()))
    }

    /// Opens an event-stream request; the caller reads the body.
    pub async fn open_stream(&self, req: &CompletionRequest) -> Result<reqwest::Response, ChatError> {
        let mut req = req.clone();
        req.stream = true;
        debug!(target:"chat::relay","open stream model={} messages={}", req.model, req.messages.len());
        self.post_chat(&req).await
    }

    pub async fn models(&self) -> Result<Vec<String>, ChatError> {
        let url = format!("{}/models", self.base_url);
        let resp = self.http.get(url).send().await.map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            return Err(map_status_err(resp.status(), resp.text().await.ok()));
        }
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        Ok(v["models"]
            .as_array()
            .map(|items| items.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
            .unwrap_or_default())
    }
}
