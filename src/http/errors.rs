//! Classification of failed responses
//!
//! Maps a non-2xx response onto the error taxonomy by status code. Providers
//! that report failures inside a 2xx body supply a [`ResponseInterpreter`].

use super::response::HttpResponse;
use crate::error::{body_excerpt, Error};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

/// Inspects successful responses for provider-specific error envelopes
pub trait ResponseInterpreter: Send + Sync {
    /// Return an error when a 2xx response actually carries a failure
    fn interpret(&self, response: &HttpResponse) -> Option<Error>;
}

/// Classify a non-2xx response
pub fn interpret_error(status: u16, headers: &HeaderMap, raw: &[u8]) -> Error {
    let body = body_excerpt(raw);
    match status {
        401 => Error::Unauthorized {
            message: format!("HTTP 401: {body}"),
        },
        403 => Error::PermissionDenied { body },
        404 => Error::NotFound { body },
        409 => Error::Conflict {
            body,
            payload: serde_json::from_slice(raw).ok(),
        },
        429 => Error::RateLimited {
            retry_after_seconds: retry_after(headers),
            body,
        },
        500..=599 => Error::ServerError { status, body },
        _ => Error::BadRequest { status, body },
    }
}

/// Parse a `Retry-After` header given as delta-seconds or an HTTP date
pub fn retry_after(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds);
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = at.with_timezone(&Utc) - Utc::now();
    Some(delta.num_seconds().max(0) as u64)
}
