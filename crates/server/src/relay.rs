//! Turns the backend's delta stream into relay frames.

use futures::{Stream, StreamExt};
use loco_core::llm::{ChatDelta, ChatStream};
use loco_core::sse::StreamFrame;
use tracing::{debug, error, info};

pub const STREAM_ERROR: &str = "Error generating streaming response";

/// Every text delta becomes a `content` frame in order. The output always ends
/// with exactly one terminal frame: `done` when the upstream body ends, or
/// `error` on the first upstream failure.
pub fn relay_frames(mut deltas: ChatStream<'static>) -> impl Stream<Item = StreamFrame> + Send + 'static {
    async_stream::stream! {
        let mut fragments = 0usize;
        while let Some(item) = deltas.next().await {
            match item {
                Ok(ChatDelta::Text(t)) => {
                    fragments += 1;
                    yield StreamFrame::Content(t);
                }
                Ok(ChatDelta::Usage { prompt_tokens, completion_tokens }) => {
                    debug!(target:"server::relay","usage prompt={:?} completion={:?}", prompt_tokens, completion_tokens);
                }
                Ok(ChatDelta::Finish(reason)) => {
                    debug!(target:"server::relay","upstream finished reason={:?}", reason);
                }
                Err(e) => {
                    error!(target:"server::relay","stream failed after {} fragments: {}", fragments, e);
                    yield StreamFrame::Error(STREAM_ERROR.to_string());
                    return;
                }
            }
        }
        info!(target:"server::relay","stream complete fragments={}", fragments);
        yield StreamFrame::Done;
    }
}
