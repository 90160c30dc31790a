use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use magi_services::{source_key, Verdict};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::server::AppState;

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Paths left out of the access log
const QUIET_PATHS: [&str; 2] = ["/health", "/status"];

/// Rate limiting, blocking and scanner detection in front of every route
pub async fn security_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let forwarded_for = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let source = source_key(forwarded_for, peer.as_deref());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let outcome = state.gate.check(&source, &method, &path, Utc::now());

    if let Some(alert) = outcome.alert {
        let sink = state.alerts.clone();
        tokio::spawn(async move {
            sink.send(&alert).await;
        });
    }

    match outcome.verdict {
        Verdict::Reject(rejection) => {
            let status = StatusCode::from_u16(rejection.status_code())
                .unwrap_or(StatusCode::TOO_MANY_REQUESTS);
            (status, Json(json!({ "error": rejection.message() }))).into_response()
        }
        Verdict::Admit { count, limit } => {
            if !QUIET_PATHS.contains(&path.as_str()) {
                tracing::info!("[ACCESS] {} {} {} ({}/{})", source, method, path, count, limit);
            }

            let mut response = next.run(request).await;
            apply_security_headers(response.headers_mut());
            response
        }
    }
}

fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}
