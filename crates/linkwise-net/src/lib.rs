//! Linkwise Net: per-API rate limiting and the shared HTTP client.

pub mod client;
pub mod ratelimit;

pub use client::HttpClient;
pub use ratelimit::{BlockingRateLimiter, RateLimitPolicy, RateLimiter};
