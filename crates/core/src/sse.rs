//! Event-stream framing between the relay and its clients.
//!
//! Every frame is a single `data: <json>` line followed by a blank line. The
//! payload is one of `{"content": ..}`, `{"done": true}` or `{"error": ..}`.
//! [`FrameDecoder`] reassembles frames from arbitrarily split byte chunks.

use bytes::{Buf, BytesMut};
use serde::Deserialize;
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    Content(String),
    Done,
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawFrame {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

impl StreamFrame {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StreamFrame::Content(c) => json!({ "content": c }),
            StreamFrame::Done => json!({ "done": true }),
            StreamFrame::Error(e) => json!({ "error": e }),
        }
    }

    pub fn encode(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Content(_))
    }

    // error > done > content; nothing usable yields Ok(None).
    pub fn parse(payload: &str) -> Result<Option<Self>, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(payload)?;
        if let Some(e) = raw.error.filter(|e| !e.is_empty()) {
            return Ok(Some(StreamFrame::Error(e)));
        }
        if raw.done == Some(true) {
            return Ok(Some(StreamFrame::Done));
        }
        Ok(raw
            .content
            .filter(|c| !c.is_empty())
            .map(StreamFrame::Content))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    Frame(StreamFrame),
    Malformed { payload: String, reason: String },
}

// Bytes stay buffered until a frame delimiter arrives; a chunk may end inside
// a JSON string or a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some((pos, delim)) = find_event_boundary(&self.buf) {
            let block = self.buf.split_to(pos).freeze();
            self.buf.advance(delim);
            decode_block(&block, &mut out);
        }
        out
    }

    /// Flushes a trailing frame that was never followed by a blank line.
    pub fn finish(&mut self) -> Vec<Decoded> {
        let rest = self.buf.split().freeze();
        let mut out = Vec::new();
        if !rest.is_empty() {
            decode_block(&rest, &mut out);
        }
        out
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

// Earliest delimiter wins; returns (offset, delimiter length).
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = twoway::find_bytes(buf, b"\n\n").map(|p| (p, 2));
    let crlf = twoway::find_bytes(buf, b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn decode_block(block: &[u8], out: &mut Vec<Decoded>) {
    let text = String::from_utf8_lossy(block);
    let data_lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.trim_start())
        .collect();
    if data_lines.is_empty() {
        return;
    }
    let payload = data_lines.join("\n");
    match StreamFrame::parse(&payload) {
        Ok(Some(frame)) => out.push(Decoded::Frame(frame)),
        Ok(None) => {}
        Err(e) => out.push(Decoded::Malformed {
            payload,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(items: Vec<Decoded>) -> Vec<StreamFrame> {
        items
            .into_iter()
            .filter_map(|d| match d {
                Decoded::Frame(f) => Some(f),
                Decoded::Malformed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn encode_matches_wire_format() {
        assert_eq!(
            StreamFrame::Content("Hel".into()).encode(),
            "data: {\"content\":\"Hel\"}\n\n"
        );
        assert_eq!(StreamFrame::Done.encode(), "data: {\"done\":true}\n\n");
        assert_eq!(
            StreamFrame::Error("boom".into()).encode(),
            "data: {\"error\":\"boom\"}\n\n"
        );
    }

    #[test]
    fn parse_precedence() {
        assert_eq!(
            StreamFrame::parse(r#"{"content":"x","done":true}"#).unwrap(),
            Some(StreamFrame::Done)
        );
        assert_eq!(
            StreamFrame::parse(r#"{"error":"bad","done":true}"#).unwrap(),
            Some(StreamFrame::Error("bad".into()))
        );
        assert_eq!(StreamFrame::parse(r#"{"done":false}"#).unwrap(), None);
        assert_eq!(StreamFrame::parse(r#"{"content":""}"#).unwrap(), None);
        assert!(StreamFrame::parse("{\"content\":").is_err());
    }

    #[test]
    fn decodes_frames_in_one_chunk() {
        let wire = [
            StreamFrame::Content("Hel".into()),
            StreamFrame::Content("lo!".into()),
            StreamFrame::Done,
        ]
        .iter()
        .map(StreamFrame::encode)
        .collect::<String>();
        let mut dec = FrameDecoder::new();
        assert_eq!(
            frames(dec.push(wire.as_bytes())),
            vec![
                StreamFrame::Content("Hel".into()),
                StreamFrame::Content("lo!".into()),
                StreamFrame::Done,
            ]
        );
        assert_eq!(dec.pending(), 0);
    }

    #[test]
    fn every_split_offset_yields_same_frames() {
        let expected = vec![
            StreamFrame::Content("h\u{e9}llo ".into()),
            StreamFrame::Content("w\u{f6}rld \u{1f30d}\n".into()),
            StreamFrame::Content("\"quoted\"".into()),
            StreamFrame::Done,
        ];
        let wire: String = expected.iter().map(StreamFrame::encode).collect();
        let bytes = wire.as_bytes();
        for split in 0..=bytes.len() {
            let mut dec = FrameDecoder::new();
            let mut got = dec.push(&bytes[..split]);
            got.extend(dec.push(&bytes[split..]));
            got.extend(dec.finish());
            assert_eq!(frames(got), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn byte_at_a_time() {
        let wire = "data: {\"content\":\"\u{4f60}\u{597d}\"}\n\ndata: {\"done\":true}\n\n";
        let mut dec = FrameDecoder::new();
        let mut got = Vec::new();
        for b in wire.as_bytes() {
            got.extend(dec.push(std::slice::from_ref(b)));
        }
        assert_eq!(
            frames(got),
            vec![StreamFrame::Content("\u{4f60}\u{597d}".into()), StreamFrame::Done]
        );
    }

    #[test]
    fn malformed_frame_is_reported_not_fatal() {
        let wire = "data: {\"content\":\"a\"}\n\ndata: {oops\n\ndata: {\"content\":\"b\"}\n\n";
        let got = FrameDecoder::new().push(wire.as_bytes());
        assert_eq!(got.len(), 3);
        assert!(matches!(&got[1], Decoded::Malformed { payload, .. } if payload == "{oops"));
        assert_eq!(
            frames(got),
            vec![StreamFrame::Content("a".into()), StreamFrame::Content("b".into())]
        );
    }

    #[test]
    fn crlf_delimiters_and_comments() {
        let wire = ": keep-alive\r\n\r\ndata: {\"content\":\"x\"}\r\n\r\nevent: ping\n\n";
        let got = FrameDecoder::new().push(wire.as_bytes());
        assert_eq!(frames(got), vec![StreamFrame::Content("x".into())]);
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut dec = FrameDecoder::new();
        assert!(dec.push(b"data: {\"done\":true}").is_empty());
        assert!(dec.pending() > 0);
        assert_eq!(frames(dec.finish()), vec![StreamFrame::Done]);
        assert!(dec.finish().is_empty());
    }
}
