//! Request correlation ids.
//!
//! Every request runs inside an `http` span carrying its id, so tick and
//! command logs emitted while handling it can be traced back to the caller.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Caller-supplied id, if it is a usable header value.
fn incoming_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Middleware: reuse or mint an id, expose it as an extension and echo it
/// on the response.
pub async fn ensure_request_id(mut request: Request, next: Next) -> Response {
    let request_id = match incoming_id(request.headers()) {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            id
        }
    };
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "http",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(incoming_id(&headers), None);

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(incoming_id(&headers), None);

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(" op-7 "));
        assert_eq!(incoming_id(&headers).as_deref(), Some("op-7"));
    }
}
