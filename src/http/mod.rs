//! HTTP transport
//!
//! Prepared requests, materialized responses and the status-code error
//! classification shared by every provider.
//!
//! # Features
//!
//! - **Cancellation**: every exchange races a `CancellationToken`
//! - **Pacing**: optional token bucket rate limiter using governor
//! - **Classification**: non-2xx statuses map onto the error taxonomy

mod client;
mod errors;
mod rate_limit;
mod request;
mod response;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use errors::{interpret_error, retry_after, ResponseInterpreter};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::{HttpRequest, RequestBody};
pub use response::HttpResponse;
