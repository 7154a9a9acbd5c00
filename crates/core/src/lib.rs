pub mod config;
pub mod conversation;
pub mod sse;

pub mod llm {
    use futures::Stream;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use thiserror::Error;

    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        Assistant,
        System,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Message {
        pub role: Role,
        pub content: String,
    }

    impl Message {
        pub fn user<S: Into<String>>(s: S) -> Self {
            Self {
                role: Role::User,
                content: s.into(),
            }
        }
        pub fn assistant<S: Into<String>>(s: S) -> Self {
            Self {
                role: Role::Assistant,
                content: s.into(),
            }
        }
        pub fn system<S: Into<String>>(s: S) -> Self {
            Self {
                role: Role::System,
                content: s.into(),
            }
        }
    }

    /// Generation parameters forwarded to the backend as its `options` object.
    /// Keys we do not model explicitly are carried through in `extra`.
    #[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
    pub struct ChatOpts {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub top_p: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub top_k: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub num_predict: Option<i32>,
        #[serde(flatten)]
        pub extra: serde_json::Map<String, Value>,
    }

    impl ChatOpts {
        pub fn is_empty(&self) -> bool {
            self.temperature.is_none()
                && self.top_p.is_none()
                && self.top_k.is_none()
                && self.num_predict.is_none()
                && self.extra.is_empty()
        }
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    pub struct CompletionRequest {
        pub model: String,
        pub messages: Vec<Message>,
        #[serde(default)]
        pub stream: bool,
        #[serde(default)]
        pub options: ChatOpts,
    }

    impl CompletionRequest {
        pub fn new<S: Into<String>>(model: S, messages: Vec<Message>) -> Self {
            Self {
                model: model.into(),
                messages,
                stream: false,
                options: ChatOpts::default(),
            }
        }

        pub fn streaming(mut self, stream: bool) -> Self {
            self.stream = stream;
            self
        }

        pub fn with_options(mut self, options: ChatOpts) -> Self {
            self.options = options;
            self
        }

        /// Builds a request from an untyped inbound body, rejecting it before
        /// anything is sent upstream.
        pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
            let raw_messages = match body.get("messages") {
                Some(Value::Array(items)) if !items.is_empty() => items,
                _ => return Err(ValidationError::MissingMessages),
            };
            let model = match body.get("model").and_then(Value::as_str) {
                Some(m) if !m.trim().is_empty() => m.to_string(),
                _ => return Err(ValidationError::MissingModel),
            };
            let messages = raw_messages
                .iter()
                .map(|m| {
                    Message::deserialize(m)
                        .map_err(|e| ValidationError::InvalidMessage(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
            let options = match body.get("options") {
                None | Some(Value::Null) => ChatOpts::default(),
                Some(v @ Value::Object(_)) => ChatOpts::deserialize(v)
                    .map_err(|e| ValidationError::InvalidOptions(e.to_string()))?,
                Some(other) => {
                    return Err(ValidationError::InvalidOptions(format!(
                        "expected an object, got {}",
                        other
                    )))
                }
            };
            Ok(Self {
                model,
                messages,
                stream,
                options,
            })
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum ChatDelta {
        Text(String),
        Finish(Option<String>),
        Usage { prompt_tokens: Option<u32>, completion_tokens: Option<u32> },
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct ChatResult {
        pub text: String,
        pub finish_reason: Option<String>,
        pub prompt_tokens: Option<u32>,
        pub completion_tokens: Option<u32>,
    }

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ValidationError {
        #[error("Messages are required and must be an array")]
        MissingMessages,
        #[error("Model is required and must be a string")]
        MissingModel,
        #[error("invalid message: {0}")]
        InvalidMessage(String),
        #[error("invalid options: {0}")]
        InvalidOptions(String),
        #[error("malformed request body: {0}")]
        Body(String),
    }

    #[derive(Error, Debug)]
    pub enum ChatError {
        #[error("timeout: {0}")] Timeout(String),
        #[error("network: {0}")] Network(String),
        #[error("upstream status {status}: {body}")] Status { status: u16, body: String },
        #[error("decode: {0}")] Decode(String),
        #[error("protocol: {0}")] Protocol(String),
        #[error("canceled")] Canceled,
        #[error("other: {0}")] Other(String),
    }

    pub type ChatStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatDelta, ChatError>> + Send + 'a>>;

    use std::pin::Pin;

    #[allow(async_fn_in_trait)]
    pub trait ModelClient: Send + Sync {
        async fn list_models(&self) -> Result<Vec<String>, ChatError>;
        async fn send_chat(&self, req: &CompletionRequest) -> Result<ChatResult, ChatError>;
        async fn stream_chat(&self, req: &CompletionRequest) -> Result<ChatStream<'static>, ChatError>;
    }

}
