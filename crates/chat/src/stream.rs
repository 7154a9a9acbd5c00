//! Consumer side of the relay's event stream.
//!
//! One spawned task owns the connection and the reply buffer. Observers get
//! snapshots through a watch channel, and the final result arrives once
//! through a oneshot channel.

use std::ops::ControlFlow;

use futures::StreamExt;
use loco_core::llm::{ChatError, CompletionRequest};
use loco_core::sse::{Decoded, FrameDecoder, StreamFrame};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::RelayClient;
use crate::strings::{STREAM_CONNECT_FAILED, STREAM_READ_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamFailure {
    #[error("connect: {0}")]
    Connect(String),
    #[error("relay status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("read: {0}")]
    Transport(String),
    #[error("relay: {0}")]
    Relay(String),
}

impl StreamFailure {
    pub fn user_message(&self) -> String {
        match self {
            StreamFailure::Connect(_) | StreamFailure::Status { .. } => STREAM_CONNECT_FAILED.to_string(),
            StreamFailure::Transport(_) => STREAM_READ_FAILED.to_string(),
            StreamFailure::Relay(msg) => msg.clone(),
        }
    }
}

impl From<ChatError> for StreamFailure {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Status { status, body } => StreamFailure::Status {
                status,
                message: body,
            },
            other => StreamFailure::Connect(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(String),
    Failed(StreamFailure),
    Cancelled,
}

impl StreamOutcome {
    fn phase(&self) -> StreamPhase {
        match self {
            StreamOutcome::Completed(_) => StreamPhase::Completed,
            StreamOutcome::Failed(_) => StreamPhase::Failed,
            StreamOutcome::Cancelled => StreamPhase::Cancelled,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReplyAssembler {
    decoder: FrameDecoder,
    reply: String,
}

impl ReplyAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Applies one body chunk. `Continue(true)` means the reply grew;
    /// `Break` carries the terminal outcome, and anything after it is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> ControlFlow<StreamOutcome, bool> {
        let items = self.decoder.push(chunk);
        self.apply(items)
    }

    /// End of body. A missing `done` frame still completes with what arrived.
    pub fn finish(mut self) -> StreamOutcome {
        let items = self.decoder.finish();
        match self.apply(items) {
            ControlFlow::Break(outcome) => outcome,
            ControlFlow::Continue(_) => {
                debug!(target:"chat::stream","body ended without done frame");
                StreamOutcome::Completed(self.reply)
            }
        }
    }

    fn apply(&mut self, items: Vec<Decoded>) -> ControlFlow<StreamOutcome, bool> {
        let mut grew = false;
        for item in items {
            match item {
                Decoded::Frame(StreamFrame::Content(c)) => {
                    self.reply.push_str(&c);
                    grew = true;
                }
                Decoded::Frame(StreamFrame::Done) => {
                    return ControlFlow::Break(StreamOutcome::Completed(std::mem::take(&mut self.reply)));
                }
                Decoded::Frame(StreamFrame::Error(e)) => {
                    return ControlFlow::Break(StreamOutcome::Failed(StreamFailure::Relay(e)));
                }
                Decoded::Malformed { payload, reason } => {
                    warn!(target:"chat::stream","skipping malformed frame {:?}: {}", payload, reason);
                }
            }
        }
        ControlFlow::Continue(grew)
    }
}

/// Live view of one stream. Dropping it cancels the stream.
pub struct StreamHandle {
    outcome: Option<oneshot::Receiver<StreamOutcome>>,
    partial: watch::Receiver<String>,
    phase: watch::Receiver<StreamPhase>,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn partial(&self) -> watch::Receiver<String> {
        self.partial.clone()
    }

    pub fn phase(&self) -> StreamPhase {
        *self.phase.borrow()
    }

    pub fn phases(&self) -> watch::Receiver<StreamPhase> {
        self.phase.clone()
    }

    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn finish(mut self) -> StreamOutcome {
        let Some(rx) = self.outcome.take() else {
            return StreamOutcome::Cancelled;
        };
        rx.await.unwrap_or_else(|_| {
            StreamOutcome::Failed(StreamFailure::Transport("stream task ended without a result".into()))
        })
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns at most one in-flight stream; starting another cancels the previous.
pub struct StreamConsumer {
    relay: RelayClient,
    active: Option<CancellationToken>,
}

impl StreamConsumer {
    pub fn new(relay: RelayClient) -> Self {
        Self { relay, active: None }
    }

    pub fn start(&mut self, req: CompletionRequest) -> StreamHandle {
        self.cancel();
        let cancel = CancellationToken::new();
        self.active = Some(cancel.clone());

        let (partial_tx, partial_rx) = watch::channel(String::new());
        let (phase_tx, phase_rx) = watch::channel(StreamPhase::Idle);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let relay = self.relay.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => StreamOutcome::Cancelled,
                outcome = drive(relay, req, &partial_tx, &phase_tx) => outcome,
            };
            match &outcome {
                StreamOutcome::Completed(reply) => {
                    info!(target:"chat::stream","stream completed chars={}", reply.chars().count())
                }
                StreamOutcome::Failed(f) => warn!(target:"chat::stream","stream failed: {}", f),
                StreamOutcome::Cancelled => debug!(target:"chat::stream","stream cancelled"),
            }
            phase_tx.send_replace(outcome.phase());
            let _ = outcome_tx.send(outcome);
        });

        StreamHandle {
            outcome: Some(outcome_rx),
            partial: partial_rx,
            phase: phase_rx,
            cancel,
        }
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }
}

async fn drive(
    relay: RelayClient,
    req: CompletionRequest,
    partial_tx: &watch::Sender<String>,
    phase_tx: &watch::Sender<StreamPhase>,
) -> StreamOutcome {
    phase_tx.send_replace(StreamPhase::Connecting);
    let resp = match relay.open_stream(&req).await {
        Ok(r) => r,
        Err(e) => return StreamOutcome::Failed(e.into()),
    };
    let mut body = resp.bytes_stream();
    let mut assembler = ReplyAssembler::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => return StreamOutcome::Failed(StreamFailure::Transport(e.to_string())),
        };
        phase_tx.send_if_modified(|p| {
            if *p == StreamPhase::Connecting {
                *p = StreamPhase::Streaming;
                true
            } else {
                false
            }
        });
        match assembler.feed(&chunk) {
            ControlFlow::Break(outcome) => return outcome,
            ControlFlow::Continue(true) => {
                partial_tx.send_replace(assembler.reply().to_string());
            }
            ControlFlow::Continue(false) => {}
        }
    }
    assembler.finish()
}
