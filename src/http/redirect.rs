//! Redirect construction.
//!
//! # Responsibilities
//! - Canonicalize the decoded request path and resolve its backend
//! - Forward the Authorization header as an `authz` query parameter
//! - Pick a status that keeps non-idempotent requests intact
//! - Emit `Location` with an empty body and no `Date`
//!
//! # Design Decisions
//! - Safe methods get 302; everything else gets 307 so method and body
//!   survive the redirect
//! - The handler cannot fail for routing reasons: there is always a backend

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::http::path::normalize;
use crate::http::server::AppState;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;

/// Everything except RFC 3986 unreserved characters is escaped.
const AUTHZ_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Query parameter carrying the forwarded credential.
pub const AUTHZ_PARAM: &str = "authz";

/// Redirect status for `method`.
///
/// Safe methods may be replayed as GET by the user agent (302); any other
/// method must be replayed verbatim with its body (307).
pub fn redirect_status(method: &Method) -> StatusCode {
    if method.is_safe() {
        StatusCode::FOUND
    } else {
        StatusCode::TEMPORARY_REDIRECT
    }
}

/// Build the redirect target: `base + path [?query] [(?|&)authz=...]`.
///
/// `path` must already be canonical. An empty query counts as absent.
pub fn build_location(
    base: &str,
    path: &str,
    query: Option<&str>,
    authorization: Option<&[u8]>,
) -> String {
    let query = query.filter(|q| !q.is_empty());

    let mut location = String::with_capacity(base.len() + path.len() + 64);
    location.push_str(base);
    location.push_str(path);
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }

    if let Some(raw) = authorization {
        location.push(if query.is_some() { '&' } else { '?' });
        location.push_str(AUTHZ_PARAM);
        location.push('=');
        location.extend(percent_encode(raw, AUTHZ_ENCODE_SET));
    }

    location
}

/// Handles every path and method with a redirect to the path's backend.
pub async fn redirect_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let path = normalize(request.uri().path());

    let decision = state.router.route(&path);
    let base = state.router.backends().base(decision.index);

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(HeaderValue::as_bytes);
    let location = build_location(base, &path, request.uri().query(), authorization);
    let status = redirect_status(&method);

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        backend = decision.index,
        cache_hit = decision.cache_hit,
        status = status.as_u16(),
        "Redirecting request"
    );
    metrics::record_redirect(&method, status.as_u16());

    redirect_response(status, location)
}

fn redirect_response(status: StatusCode, location: String) -> Response {
    let location = match HeaderValue::try_from(location) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Redirect target is not a valid header value");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.remove(header::DATE);
    response
}
