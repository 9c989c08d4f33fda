//! Local stub of the design backend for integration tests

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// How the stub answers a given path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    ServerError,
    Malformed,
    /// Wait this long before answering normally
    Slow(u64),
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct Stub {
    requests: Arc<Mutex<Vec<Recorded>>>,
    behaviors: Arc<Mutex<HashMap<String, Behavior>>>,
}

impl Stub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(path.trim_start_matches('/').to_string(), behavior);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == path.trim_start_matches('/'))
            .count()
    }

    /// Body of the most recent request to `path`
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.path == path.trim_start_matches('/'))
            .map(|r| r.body)
    }

    /// Bind to an ephemeral port and serve in the background; returns the origin
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

/// An origin nothing listens on
pub async fn refused_origin() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn handle(State(stub): State<Stub>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().trim_start_matches('/').to_string();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    stub.requests.lock().unwrap().push(Recorded {
        method,
        path: path.clone(),
        body,
    });

    let behavior = stub
        .behaviors
        .lock()
        .unwrap()
        .get(&path)
        .copied()
        .unwrap_or(Behavior::Ok);

    match behavior {
        Behavior::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream model exploded").into_response()
        }
        Behavior::Malformed => return (StatusCode::OK, "<html>not json</html>").into_response(),
        Behavior::Slow(ms) => tokio::time::sleep(std::time::Duration::from_millis(ms)).await,
        Behavior::Ok => {}
    }

    match canned(&path) {
        Some(value) => Json(value).into_response(),
        None => (StatusCode::NOT_FOUND, "no such endpoint").into_response(),
    }
}

fn canned(path: &str) -> Option<Value> {
    let value = match path {
        "generate-fal-image" => json!({ "image_url": "https://cdn.test/generated.png" }),
        "redesign-fal-image" => json!({ "image_url": "https://cdn.test/redesigned.png" }),
        "segment" => json!({
            "segments": [
                { "mask": "https://cdn.test/mask-0.png", "label": "sofa", "confidence": 0.93 },
                { "mask": "https://cdn.test/mask-1.png", "label": "rug" }
            ]
        }),
        "recolor" => json!({ "image_url": "https://cdn.test/recolored.png" }),
        "reconstruct" => json!({
            "reconstruction_url": "https://cdn.test/room.glb",
            "model_info": {
                "model_used": "trellis",
                "file_size": 2048,
                "content_type": "model/gltf-binary"
            }
        }),
        "generate-voiceover" => json!({ "voiceover_url": "/static/voiceover.mp3" }),
        "get-designer-quote" => json!({ "quote": "Have nothing in your house that you do not know to be useful." }),
        "chat-with-avatar" => json!({ "response": "Warm oak would suit that room.", "source": "stub" }),
        "health" => json!({ "status": "healthy", "fal_api_configured": true }),
        "available-models" => json!({
            "available_models": [
                { "model": "trellis", "status": "available" },
                { "model": "hunyuan3d", "status": "error", "error": "quota" }
            ],
            "demo_glb_url": "https://cdn.test/demo.glb"
        }),
        _ => return None,
    };
    Some(value)
}
