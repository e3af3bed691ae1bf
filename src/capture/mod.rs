//! Capture engine: inbound queue, capture loop and session lifecycle

mod engine;
mod queue;
mod session;

pub use engine::{CaptureLoop, CaptureOutcome, StopReason};
pub use queue::{inbound_queue, QueueReceiver, QueueSender};
pub use session::{capture_requests, capture_requests_blocking, CaptureSession};
