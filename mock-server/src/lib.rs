use std::{collections::BTreeMap, time::Duration};

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What the server saw of an incoming request, returned by `/inspect`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inspection {
    pub method: String,
    pub content_length: Option<String>,
    pub transfer_encoding: Option<String>,
    pub body_len: usize,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/echo", post(echo).put(echo).patch(echo))
        .route("/status/{code}", any(status))
        .route("/cookies", get(cookies))
        .route("/inspect", any(inspect))
        .route("/slow/{ms}", get(slow))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn ok() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "hi")
}

async fn echo(headers: HeaderMap, body: String) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();
    (StatusCode::CREATED, [(header::CONTENT_TYPE, content_type)], body)
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("status {}", status.as_u16()))
}

async fn cookies() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, "a"), (header::SET_COOKIE, "b")]),
        "cookies",
    )
}

async fn inspect(method: Method, headers: HeaderMap, body: Bytes) -> Json<Inspection> {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut seen = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|joined: &mut String| {
                joined.push(',');
                joined.push_str(&value);
            })
            .or_insert_with(|| value.clone());
    }
    Json(Inspection {
        method: method.to_string(),
        content_length: header_str(header::CONTENT_LENGTH),
        transfer_encoding: header_str(header::TRANSFER_ENCODING),
        body_len: body.len(),
        body: String::from_utf8_lossy(&body).into_owned(),
        headers: seen,
    })
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "done"
}
