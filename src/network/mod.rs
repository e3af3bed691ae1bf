//! Network layer for Reqbin
//!
//! A loopback HTTP/1.1 endpoint that answers every request with a fixed
//! status and forwards a record of it to the capture queue.

mod http;
mod server;

pub use http::HttpHandler;
pub use server::EndpointServer;

/// Grace period for in-flight requests when the endpoint stops
pub const SHUTDOWN_TIMEOUT_MS: u64 = 1000;
