//! Picks the transport for each turn and commits finished exchanges.

use loco_core::conversation::{Conversation, ConversationStore, StoreError};
use loco_core::llm::{CompletionRequest, Message};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::relay::RelayClient;
use crate::stream::{StreamConsumer, StreamHandle, StreamOutcome};
use crate::strings::CONNECT_ERROR_TURN;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant reply, appended to the conversation. A failed save is
    /// reported through `take_save_error`.
    Committed(String),
    /// User-visible failure text.
    Failed(String),
    Cancelled,
}

/// A streamed turn in flight. The user turn stays out of the conversation
/// until the stream completes.
pub struct PendingTurn {
    user: Message,
    handle: StreamHandle,
}

impl PendingTurn {
    pub fn user(&self) -> &Message {
        &self.user
    }

    pub fn partial(&self) -> watch::Receiver<String> {
        self.handle.partial()
    }

    pub fn canceller(&self) -> CancellationToken {
        self.handle.canceller()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

pub struct Orchestrator<S: ConversationStore> {
    relay: RelayClient,
    consumer: StreamConsumer,
    store: S,
    settings: Settings,
    conversation: Conversation,
    save_error: Option<StoreError>,
}

impl<S: ConversationStore> Orchestrator<S> {
    /// Restores the most recent stored conversation, or starts a new one.
    pub fn new(relay: RelayClient, store: S, settings: Settings) -> Self {
        let conversation = match store.latest() {
            Ok(Some(c)) => {
                info!(target:"chat::orchestrator","restored conversation id={} messages={}", c.id, c.messages.len());
                c
            }
            Ok(None) => Conversation::new(settings.default_model.clone()),
            Err(e) => {
                warn!(target:"chat::orchestrator","could not read conversations, starting fresh: {}", e);
                Conversation::new(settings.default_model.clone())
            }
        };
        Self {
            consumer: StreamConsumer::new(relay.clone()),
            relay,
            store,
            settings,
            conversation,
            save_error: None,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_streaming(&mut self, on: bool) {
        self.settings.streaming = on;
    }

    pub fn set_model<M: Into<String>>(&mut self, model: M) {
        let model = model.into();
        self.settings.default_model = model.clone();
        self.conversation.model = model;
    }

    /// Cancels any active stream and starts an empty conversation on the
    /// current model.
    pub fn new_conversation(&mut self) -> Result<(), StoreError> {
        self.consumer.cancel();
        let mut conversation = Conversation::new(self.conversation.model.clone());
        self.store.save(&mut conversation)?;
        self.conversation = conversation;
        Ok(())
    }

    /// Switches to a stored conversation. Returns false when `id` is unknown.
    pub fn select_conversation(&mut self, id: &str) -> Result<bool, StoreError> {
        let Some(found) = self.store.get(id)? else {
            return Ok(false);
        };
        self.consumer.cancel();
        self.conversation = found;
        Ok(true)
    }

    /// Deletes a stored conversation. Deleting the open one starts a fresh
    /// conversation on the same model. Returns false when `id` is unknown.
    pub fn delete_conversation(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.store.get(id)?.is_none() && self.conversation.id != id {
            return Ok(false);
        }
        self.store.delete(id)?;
        if self.conversation.id == id {
            self.consumer.cancel();
            self.conversation = Conversation::new(self.conversation.model.clone());
        }
        Ok(true)
    }

    /// Drops every stored conversation and starts a fresh one.
    pub fn clear_conversations(&mut self) -> Result<(), StoreError> {
        self.consumer.cancel();
        self.store.clear()?;
        self.conversation = Conversation::new(self.conversation.model.clone());
        Ok(())
    }

    /// The last save failure since this was called, if any.
    pub fn take_save_error(&mut self) -> Option<StoreError> {
        self.save_error.take()
    }

    pub fn conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        self.store.list()
    }

    /// Request for sending `user` next. Buffered requests carry the whole
    /// conversation, which already holds the user turn; streamed requests
    /// carry the user turn alone unless `stream_history` is set.
    pub fn request_for(&self, user: &Message, stream: bool) -> CompletionRequest {
        let messages = if stream && !self.settings.stream_history {
            vec![user.clone()]
        } else if stream {
            let mut all = self.conversation.messages.clone();
            all.push(user.clone());
            all
        } else {
            self.conversation.messages.clone()
        };
        CompletionRequest::new(self.conversation.model.clone(), messages)
            .streaming(stream)
            .with_options(self.settings.chat_options())
    }

    /// Sends one turn in the configured mode and waits for it to finish.
    pub async fn send(&mut self, text: &str) -> TurnOutcome {
        if self.settings.streaming {
            let pending = self.begin_stream(text);
            self.finish_stream(pending).await
        } else {
            self.send_buffered(text).await
        }
    }

    pub async fn send_buffered(&mut self, text: &str) -> TurnOutcome {
        self.conversation.push(Message::user(text));
        let req = self.request_for(&Message::user(text), false);
        match self.relay.complete(&req).await {
            Ok(reply) => {
                self.conversation.push(Message::assistant(reply.clone()));
                self.persist();
                TurnOutcome::Committed(reply)
            }
            Err(e) => {
                warn!(target:"chat::orchestrator","buffered turn failed: {}", e);
                self.conversation.push(Message::assistant(CONNECT_ERROR_TURN));
                TurnOutcome::Failed(CONNECT_ERROR_TURN.to_string())
            }
        }
    }

    /// Starts a streamed turn, superseding any stream already running.
    pub fn begin_stream(&mut self, text: &str) -> PendingTurn {
        let user = Message::user(text);
        let req = self.request_for(&user, true);
        debug!(target:"chat::orchestrator","begin stream model={} messages={}", req.model, req.messages.len());
        let handle = self.consumer.start(req);
        PendingTurn { user, handle }
    }

    /// Waits for a streamed turn; only a completed stream touches the
    /// conversation.
    pub async fn finish_stream(&mut self, pending: PendingTurn) -> TurnOutcome {
        let PendingTurn { user, handle } = pending;
        match handle.finish().await {
            StreamOutcome::Completed(reply) => {
                self.conversation.push(user);
                self.conversation.push(Message::assistant(reply.clone()));
                self.persist();
                TurnOutcome::Committed(reply)
            }
            StreamOutcome::Failed(f) => TurnOutcome::Failed(f.user_message()),
            StreamOutcome::Cancelled => TurnOutcome::Cancelled,
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&mut self.conversation) {
            warn!(target:"chat::orchestrator","saving conversation {} failed: {}", self.conversation.id, e);
            self.save_error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use loco_core::llm::Role;

    fn orchestrator(settings: Settings) -> Orchestrator<MemoryStore> {
        let relay = RelayClient::new("http://127.0.0.1:9").unwrap();
        let mut conv = Conversation::new("llama2");
        conv.id = "stored".into();
        conv.push(Message::user("earlier"));
        conv.push(Message::assistant("answer"));
        Orchestrator::new(relay, MemoryStore::with_conversations(vec![conv]), settings)
    }

    #[test]
    fn restores_latest_conversation() {
        let o = orchestrator(Settings::default());
        assert_eq!(o.conversation().messages.len(), 2);
    }

    #[test]
    fn streamed_request_is_single_user_turn_by_default() {
        let o = orchestrator(Settings::default());
        let req = o.request_for(&Message::user("hi"), true);
        assert!(req.stream);
        assert_eq!(req.messages, vec![Message::user("hi")]);
        assert_eq!(req.model, "llama2");
        assert_eq!(req.options.temperature, Some(0.7));
    }

    #[test]
    fn stream_history_prepends_prior_turns() {
        let o = orchestrator(Settings {
            stream_history: true,
            ..Settings::default()
        });
        let req = o.request_for(&Message::user("hi"), true);
        let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User]);
        assert_eq!(req.messages[2].content, "hi");
    }

    #[test]
    fn set_model_applies_to_requests() {
        let mut o = orchestrator(Settings::default());
        o.set_model("mistral");
        assert_eq!(o.request_for(&Message::user("x"), false).model, "mistral");
        assert_eq!(o.settings().default_model, "mistral");
    }

    #[tokio::test]
    async fn new_and_select_conversation() {
        let mut o = orchestrator(Settings::default());
        let old = o.conversation().id.clone();
        o.new_conversation().unwrap();
        assert!(o.conversation().is_empty());
        assert_eq!(o.conversations().unwrap().len(), 2);
        assert!(o.select_conversation(&old).unwrap());
        assert_eq!(o.conversation().id, old);
        assert!(!o.select_conversation("nope").unwrap());
    }

    #[tokio::test]
    async fn deleting_open_conversation_starts_fresh() {
        let mut o = orchestrator(Settings::default());
        assert!(!o.delete_conversation("nope").unwrap());
        assert!(o.delete_conversation("stored").unwrap());
        assert!(o.conversation().is_empty());
        assert_ne!(o.conversation().id, "stored");
        assert_eq!(o.conversation().model, "llama2");
        assert!(o.conversations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_other_conversation_keeps_open_one() {
        let mut o = orchestrator(Settings::default());
        let mut other = Conversation::new("mistral");
        other.id = "other".into();
        o.store.save(&mut other).unwrap();
        assert!(o.delete_conversation("other").unwrap());
        assert_eq!(o.conversation().id, "stored");
        assert_eq!(o.conversations().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let mut o = orchestrator(Settings::default());
        o.clear_conversations().unwrap();
        assert!(o.conversations().unwrap().is_empty());
        assert!(o.conversation().is_empty());
    }
}
