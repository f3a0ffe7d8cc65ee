//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        HeaderMap, HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::Error;

/// The number of bytes of a body that is logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated
/// and the full body is logged at the `debug` level. Passwords in log-in
/// forms, bearer tokens and cookies are never logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(error) => return error.into_response(),
    };
    let body_text = String::from_utf8_lossy(&body);

    let is_form = parts.method == Method::POST
        && parts
            .headers
            .get(CONTENT_TYPE)
            .is_some_and(|content_type| content_type == "application/x-www-form-urlencoded");
    let display_text = if is_form {
        redact_password(&body_text, "password")
    } else {
        body_text.to_string()
    };

    log_body(
        &format!(
            "Received request: {} {}\nheaders: {:#?}",
            parts.method,
            parts.uri,
            redact_headers(&parts.headers)
        ),
        &display_text,
    );

    let request = Request::from_parts(parts, Body::from(body));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(error) => return error.into_response(),
    };

    log_body(
        &format!(
            "Sending response: {}\nheaders: {:#?}",
            parts.status,
            redact_headers(&parts.headers)
        ),
        &String::from_utf8_lossy(&body),
    );

    Response::from_parts(parts, Body::from(body))
}

async fn read_body(body: Body) -> Result<Bytes, Error> {
    axum::body::to_bytes(body, usize::MAX).await.map_err(|error| {
        tracing::error!("Could not read body for logging: {error}");
        Error::BodyReadError(error.to_string())
    })
}

fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    for name in [AUTHORIZATION, COOKIE, SET_COOKIE] {
        if headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(REDACTED));
        }
    }

    headers
}

fn redact_password(form_text: &str, field_name: &str) -> String {
    let key = format!("{field_name}=");

    form_text
        .split('&')
        .map(|pair| {
            if pair.starts_with(&key) {
                format!("{key}{REDACTED}")
            } else {
                pair.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The longest prefix of `text` that is at most `limit` bytes and ends on a
/// character boundary.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_body(summary: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{summary}\nbody: {}...",
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{summary}\nbody: {body:?}");
    }
}
