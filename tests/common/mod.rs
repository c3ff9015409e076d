//! Registry stub for integration tests.
//!
//! An axum router with a single fallback handler: every request is recorded,
//! then answered by the test's responder closure.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::stream::{self, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// "POST /subjects/a/versions" style summary
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    /// Send the start of the body, then abort the connection
    pub truncated: bool,
}

impl StubResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            truncated: false,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn truncated(status: u16) -> Self {
        Self {
            status,
            body: "{\"err".to_string(),
            truncated: true,
        }
    }
}

type Responder = Box<dyn FnMut(&RecordedRequest) -> StubResponse + Send>;

struct StubState {
    requests: Vec<RecordedRequest>,
    responder: Responder,
}

type SharedState = Arc<Mutex<StubState>>;

pub struct StubRegistry {
    addr: SocketAddr,
    state: SharedState,
    server: JoinHandle<()>,
}

impl StubRegistry {
    pub async fn start<F>(responder: F) -> Self
    where
        F: FnMut(&RecordedRequest) -> StubResponse + Send + 'static,
    {
        let state = Arc::new(Mutex::new(StubState {
            requests: Vec::new(),
            responder: Box::new(responder),
        }));

        let router = Router::new().fallback(record).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.requests().iter().map(RecordedRequest::line).collect()
    }
}

impl Drop for StubRegistry {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A port nothing is listening on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn record(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    };

    let response = {
        let mut state = state.lock().unwrap();
        state.requests.push(request.clone());
        (state.responder)(&request)
    };

    let status = StatusCode::from_u16(response.status).unwrap();
    let json = [(header::CONTENT_TYPE, "application/json")];

    if !response.truncated {
        return (status, json, response.body).into_response();
    }

    // The pause lets the head and first chunk reach the client before the
    // stream errors and the connection is dropped mid-body.
    let head = Bytes::from(response.body);
    let body = stream::once(async move { Ok::<_, io::Error>(head) }).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(io::Error::new(io::ErrorKind::ConnectionAborted, "stub hung up"))
    }));
    (status, json, Body::from_stream(body)).into_response()
}
