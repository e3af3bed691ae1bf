//! Capture loop: drains the inbound queue until a termination policy fires

use std::fmt;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::config::TerminationPolicy;
use crate::record::RequestRecord;

use super::queue::QueueReceiver;

/// Why a capture stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `max_requests` records were captured
    MaxRequests,
    /// No arrival within the idle timeout
    IdleTimeout,
    /// The global deadline passed
    GlobalTimeout,
    /// Every producer went away
    QueueClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::MaxRequests => "max request count reached",
            StopReason::IdleTimeout => "idle timeout",
            StopReason::GlobalTimeout => "global timeout",
            StopReason::QueueClosed => "queue closed",
        };
        f.write_str(reason)
    }
}

/// Records captured in arrival order, plus the policy that ended the capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Captured records, in queue order
    pub records: Vec<RequestRecord>,
    /// Termination cause
    pub reason: StopReason,
}

/// Races queue arrivals against the configured timers
#[derive(Debug, Clone, Copy)]
pub struct CaptureLoop {
    policy: TerminationPolicy,
}

impl CaptureLoop {
    /// Create a capture loop for a policy
    #[must_use]
    pub fn new(policy: TerminationPolicy) -> Self {
        debug_assert!(policy.is_bounded(), "capture loop without a termination policy");
        Self { policy }
    }

    /// Run until a policy fires
    ///
    /// Timers are armed when this is called. The count check runs before
    /// every wait, and a ready arrival always wins over a matured timer.
    /// A policy with only `max_requests` set waits forever if fewer records
    /// ever arrive.
    pub async fn run(&self, queue: &mut QueueReceiver) -> CaptureOutcome {
        let armed_at = Instant::now();
        let global_deadline = self.policy.global_timeout.map(|timeout| armed_at + timeout);
        let mut last_arrival = armed_at;
        let mut records = Vec::new();

        let reason = loop {
            if let Some(max) = self.policy.max_requests {
                if records.len() >= max {
                    break StopReason::MaxRequests;
                }
            }

            // A fresh idle timer per wait, measured from the latest arrival
            let idle_deadline = self.policy.idle_timeout.map(|timeout| last_arrival + timeout);

            tokio::select! {
                biased;

                next = queue.recv() => match next {
                    Some(record) => {
                        debug!(
                            "Captured {} {} ({} bytes, #{})",
                            record.method,
                            record.path,
                            record.body.len(),
                            records.len() + 1
                        );
                        records.push(record);
                        last_arrival = Instant::now();
                    }
                    None => break StopReason::QueueClosed,
                },
                () = wait_until(idle_deadline) => break StopReason::IdleTimeout,
                () = wait_until(global_deadline) => break StopReason::GlobalTimeout,
            }
        };

        info!(
            "Capture finished: {} ({} requests in {:?})",
            reason,
            records.len(),
            armed_at.elapsed()
        );

        CaptureOutcome { records, reason }
    }
}

/// Sleep until `deadline`, or forever if there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
