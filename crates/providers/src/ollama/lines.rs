//! Reassembly of Ollama's newline-delimited JSON stream.
//!
//! Network chunks do not line up with JSON objects: one read may carry half
//! an object, or several. Bytes are held until a `\n` completes the line.

use bytes::BytesMut;
use loco_core::llm::{ChatDelta, ChatError};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct LineReassembler {
    buf: BytesMut,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line completed by `chunk`, terminator included.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = twoway::find_bytes(&self.buf, b"\n") {
            let line = self.buf.split_to(pos + 1);
            out.push(String::from_utf8_lossy(&line).into_owned());
        }
        out
    }

    /// Unterminated remainder at end of input, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = self.buf.split();
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Maps one upstream line to deltas.
///
/// Lines that are not JSON objects pass through verbatim as text. An object
/// carrying `error` ends the stream.
pub fn interpret_line(line: &str) -> Result<Vec<ChatDelta>, ChatError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    let v = match serde_json::from_str::<Value>(line) {
        Ok(v) if v.is_object() => v,
        _ => return Ok(vec![ChatDelta::Text(line.to_string())]),
    };
    if let Some(err) = v.get("error") {
        let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(ChatError::Protocol(msg));
    }
    let mut out = Vec::new();
    if let Some(content) = v["message"]["content"].as_str() {
        if !content.is_empty() {
            out.push(ChatDelta::Text(content.to_string()));
        }
    }
    if v["done"].as_bool() == Some(true) {
        out.push(ChatDelta::Usage {
            prompt_tokens: token_count(&v["prompt_eval_count"]),
            completion_tokens: token_count(&v["eval_count"]),
        });
        out.push(ChatDelta::Finish(v["done_reason"].as_str().map(str::to_string)));
    }
    Ok(out)
}

pub(crate) fn token_count(v: &Value) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}
