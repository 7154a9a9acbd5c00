use crate::http::{map_reqwest_err, map_status_err};
use crate::ollama::config::OllamaConfig;
use crate::ollama::lines::{interpret_line, token_count, LineReassembler};
use futures::StreamExt;
use loco_core::llm::{ChatError, ChatResult, ChatStream, CompletionRequest, ModelClient};
use reqwest::Client;
use tokio::time::Duration;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: OllamaConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .connect_timeout(cfg.connect_timeout);
        // No overall timeout: a streamed reply may legitimately take minutes.
        builder = match &cfg.proxy {
            Some(p) => builder.proxy(reqwest::Proxy::all(p)?),
            None => builder.no_proxy(),
        };
        let http = builder.build()?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.cfg
    }

    fn chat_body(req: &CompletionRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": req.model,
            "messages": req.messages,
            "stream": stream,
        });
        if !req.options.is_empty() {
            if let Some(map) = body.as_object_mut() {
                map.insert("options".to_string(), serde_json::json!(req.options));
            }
        }
        body
    }

    async fn post_chat(&self, req: &CompletionRequest, stream: bool) -> Result<reqwest::Response, ChatError> {
        let url = self.cfg.endpoint("api/chat");
        let resp = self
            .http
            .post(&url)
            .json(&Self::chat_body(req, stream))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.ok();
            error!(target:"providers::ollama","chat non-200 status={} stream={} body={:?}", status, stream, body);
            return Err(map_status_err(status, body));
        }
        Ok(resp)
    }
}

#[allow(async_fn_in_trait)]
impl ModelClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let url = self.cfg.endpoint("api/tags");
        let resp = self.http.get(&url).send().await.map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            return Err(map_status_err(resp.status(), resp.text().await.ok()));
        }
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        let models = v["models"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        debug!(target:"providers::ollama","listed models={:?}", models);
        Ok(models)
    }

    async fn send_chat(&self, req: &CompletionRequest) -> Result<ChatResult, ChatError> {
        info!(target:"providers::ollama","chat model={} messages={}", req.model, req.messages.len());
        let resp = self.post_chat(req, false).await?;
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        if let Some(err) = v["error"].as_str() {
            return Err(ChatError::Protocol(err.to_string()));
        }
        let text = v["message"]["content"].as_str().unwrap_or("").to_string();
        Ok(ChatResult {
            text,
            finish_reason: v["done_reason"].as_str().map(str::to_string),
            prompt_tokens: token_count(&v["prompt_eval_count"]),
            completion_tokens: token_count(&v["eval_count"]),
        })
    }

    async fn stream_chat(&self, req: &CompletionRequest) -> Result<ChatStream<'static>, ChatError> {
        info!(target:"providers::ollama","start chat stream model={} messages={}", req.model, req.messages.len());
        let resp = self.post_chat(req, true).await?;
        let mut body = resp.bytes_stream();
        let s = async_stream::stream! {
            let mut lines = LineReassembler::new();
            'outer: loop {
                let (ready, eof) = match body.next().await {
                    Some(Ok(chunk)) => (lines.push(&chunk), false),
                    Some(Err(e)) => { yield Err(map_reqwest_err(e)); break 'outer; }
                    None => (lines.finish().into_iter().collect::<Vec<_>>(), true),
                };
                for line in ready {
                    match interpret_line(&line) {
                        Ok(deltas) => {
                            for d in deltas { yield Ok(d); }
                        }
                        Err(e) => { yield Err(e); break 'outer; }
                    }
                }
                if eof { break; }
            }
        };
        Ok(Box::pin(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loco_core::llm::{ChatOpts, Message};

    #[test]
    fn chat_body_omits_empty_options() {
        let req = CompletionRequest::new("llama2", vec![Message::user("hi")]);
        let body = OllamaClient::chat_body(&req, false);
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama2",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn chat_body_forwards_options() {
        let opts = ChatOpts {
            temperature: Some(0.25),
            num_predict: Some(128),
            ..ChatOpts::default()
        };
        let req = CompletionRequest::new("llama2", vec![Message::user("hi")]).with_options(opts);
        let body = OllamaClient::chat_body(&req, true);
        assert_eq!(body["stream"], true);
        assert_eq!(
            body["options"],
            serde_json::json!({"temperature": 0.25, "num_predict": 128})
        );
    }
}
