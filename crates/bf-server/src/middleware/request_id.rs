//! Request ID middleware.
//!
//! Every request runs inside a `request` span carrying a request id and an
//! initially empty `job` field. The coordinator fills `job` in once a job is
//! created, so upload, probe, mux and delivery logs for one conversion share
//! both ids. The request id is echoed back in `x-request-id` and in JSON error
//! bodies.

use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Header name used for the request identifier.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied id that is reused as-is.
const MAX_CLIENT_ID_LEN: usize = 64;

/// Middleware that generates or adopts a request ID.
pub async fn request_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(client_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        job = tracing::field::Empty,
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), val);
    }

    response
}

/// A client id is adopted only if it is short and made of visible ASCII, since
/// it ends up in log lines and error bodies.
fn client_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let ok = !raw.is_empty()
        && raw.len() <= MAX_CLIENT_ID_LEN
        && raw.bytes().all(|b| b.is_ascii_graphic());
    ok.then(|| raw.to_string())
}

/// Extracted request ID from the request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_adopted_when_clean() {
        assert_eq!(client_id(" abc-123 ").as_deref(), Some("abc-123"));
    }

    #[test]
    fn client_id_rejected_when_unsafe() {
        assert_eq!(client_id(""), None);
        assert_eq!(client_id("has space"), None);
        assert_eq!(client_id("tab\there"), None);
        assert_eq!(client_id(&"x".repeat(MAX_CLIENT_ID_LEN + 1)), None);
    }
}
