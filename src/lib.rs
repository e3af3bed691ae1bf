//! Reqbin - capture the outgoing HTTP requests of a function under test
//!
//! A throwaway loopback endpoint is started, its URL is handed to the
//! function, and every request that reaches the endpoint is collected in
//! arrival order until a termination policy fires: a global deadline, an
//! idle timeout re-armed on every arrival, or a maximum request count.
//!
//! ```no_run
//! use reqbin::{capture_requests, CaptureSettings};
//!
//! # async fn run() -> reqbin::Result<()> {
//! let records = capture_requests(CaptureSettings::default().with_idle_timeout(1), |url| async move {
//!     // issue requests against `url`
//!     let _ = url;
//! })
//! .await?;
//! for record in &records {
//!     println!("{} {} {}", record.method, record.path, record.body_text());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod capture;
pub mod config;
pub mod error;
pub mod network;
pub mod record;

pub use capture::{capture_requests, capture_requests_blocking, CaptureSession, StopReason};
pub use config::{CaptureConfig, CaptureSettings, TerminationPolicy};
pub use error::{ReqbinError, Result};
pub use record::RequestRecord;
