#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use loco_core::sse::StreamFrame;
use serde_json::{json, Value};

/// Request bodies the fake relay has received, in order.
pub type Seen = Arc<Mutex<Vec<Value>>>;

fn event_stream(body: Body) -> Response {
    (
        [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}

fn frames(items: &[StreamFrame], chunk: usize) -> Body {
    let wire: String = items.iter().map(StreamFrame::encode).collect();
    let chunks: Vec<Result<Vec<u8>, Infallible>> = wire
        .into_bytes()
        .chunks(chunk)
        .map(|c| Ok(c.to_vec()))
        .collect();
    Body::from_stream(futures::stream::iter(chunks))
}

// Behavior is picked by model name.
async fn fake_chat(State(seen): State<Seen>, Json(body): Json<Value>) -> Response {
    seen.lock().unwrap().push(body.clone());
    let model = body["model"].as_str().unwrap_or_default().to_string();
    let stream = body["stream"] == true;
    match (model.as_str(), stream) {
        ("down", _) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to generate response from Ollama"})),
        )
            .into_response(),
        (_, false) => Json(json!({"response": "Hello!"})).into_response(),
        ("hang", true) => {
            let first = StreamFrame::Content("partial".into()).encode();
            let items = async_stream::stream! {
                yield Ok::<_, Infallible>(first.into_bytes());
                std::future::pending::<()>().await;
            };
            event_stream(Body::from_stream(items))
        }
        ("broken", true) => {
            let first = StreamFrame::Content("partial".into()).encode();
            let items = async_stream::stream! {
                yield Ok::<_, std::io::Error>(first.into_bytes());
                // Give the first frame time to reach the client before the
                // connection dies.
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                yield Err(std::io::Error::new(std::io::ErrorKind::Other, "relay crashed"));
            };
            event_stream(Body::from_stream(items))
        }
        ("error", true) => event_stream(frames(
            &[
                StreamFrame::Content("so far".into()),
                StreamFrame::Error("Error generating streaming response".into()),
            ],
            4,
        )),
        ("nodone", true) => event_stream(frames(&[StreamFrame::Content("cut".into())], 64)),
        (_, true) => event_stream(frames(
            &[
                StreamFrame::Content("Hel".into()),
                StreamFrame::Content("lo!".into()),
                StreamFrame::Done,
            ],
            3,
        )),
    }
}

/// Starts a fake relay and returns its base URL and the captured bodies.
pub async fn spawn_relay() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/chat", post(fake_chat))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

/// A base URL nothing is listening on.
pub fn dead_url() -> String {
    let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = l.local_addr().unwrap();
    drop(l);
    format!("http://{}", addr)
}
