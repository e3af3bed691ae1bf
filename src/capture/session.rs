//! Capture session lifecycle
//!
//! A session binds one endpoint, one inbound queue and one configuration.
//! It is single-use: `new` → `start` → `collect` → `close`.

use std::future::Future;

use tracing::info;

use crate::config::{CaptureConfig, CaptureSettings};
use crate::network::EndpointServer;
use crate::record::RequestRecord;
use crate::{ReqbinError, Result};

use super::engine::{CaptureLoop, CaptureOutcome};
use super::queue::{inbound_queue, QueueReceiver};

enum SessionState {
    Ready,
    Started(QueueReceiver),
    Closed,
}

/// Throwaway capture endpoint plus the queue it feeds
pub struct CaptureSession {
    config: CaptureConfig,
    server: EndpointServer,
    state: SessionState,
}

impl CaptureSession {
    /// Validate settings and create a session; no socket is bound yet
    ///
    /// # Errors
    ///
    /// Returns [`ReqbinError::Config`] if the settings are invalid
    pub fn new(settings: CaptureSettings) -> Result<Self> {
        Self::with_config(CaptureConfig::validate(settings)?)
    }

    /// Create a session from an already validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`ReqbinError::Config`] if the status code is unusable
    pub fn with_config(config: CaptureConfig) -> Result<Self> {
        let server = EndpointServer::new(&config)?;

        Ok(Self {
            config,
            server,
            state: SessionState::Ready,
        })
    }

    /// Open the queue and bind the endpoint, returning its URL
    ///
    /// # Errors
    ///
    /// Returns error if the session was already started or closed, or if
    /// the listener cannot be bound
    pub async fn start(&mut self) -> Result<String> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Started(_) => {
                return Err(ReqbinError::InvalidState(
                    "session already started".to_string(),
                ))
            }
            SessionState::Closed => return Err(closed()),
        }

        let (tx, rx) = inbound_queue();
        self.server.start(tx).await?;
        self.state = SessionState::Started(rx);

        self.url()
    }

    /// URL of the endpoint, valid between `start` and `close`
    ///
    /// # Errors
    ///
    /// Returns error if the session is not running
    pub fn url(&self) -> Result<String> {
        match self.state {
            SessionState::Started(_) => self
                .server
                .url()
                .ok_or_else(|| ReqbinError::Other("endpoint has no address".to_string())),
            SessionState::Ready => Err(not_started()),
            SessionState::Closed => Err(closed()),
        }
    }

    /// Run the capture loop until a termination policy fires
    ///
    /// Timers are armed when this is called.
    ///
    /// # Errors
    ///
    /// Returns error if the session is not running
    pub async fn collect(&mut self) -> Result<Vec<RequestRecord>> {
        Ok(self.collect_outcome().await?.records)
    }

    /// Like [`collect`](Self::collect), also reporting why the capture stopped
    ///
    /// # Errors
    ///
    /// Returns error if the session is not running
    pub async fn collect_outcome(&mut self) -> Result<CaptureOutcome> {
        let queue = match &mut self.state {
            SessionState::Started(queue) => queue,
            SessionState::Ready => return Err(not_started()),
            SessionState::Closed => return Err(closed()),
        };

        Ok(CaptureLoop::new(self.config.policy()).run(queue).await)
    }

    /// Stop the endpoint and close the queue
    ///
    /// # Errors
    ///
    /// Returns error if the session was already closed
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Closed => Err(closed()),
            SessionState::Ready => Ok(()),
            SessionState::Started(queue) => {
                self.server.stop().await;
                queue.close();
                Ok(())
            }
        }
    }

    /// Start, run `f` with the URL to completion, collect, then close
    ///
    /// Work that `f` spawns without awaiting races against the timers.
    ///
    /// # Errors
    ///
    /// Returns error if the session was already used or binding fails
    pub async fn capture<F, Fut>(mut self, f: F) -> Result<Vec<RequestRecord>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        let url = self.start().await?;
        info!("Running function under test against {}", url);
        f(url).await;

        let records = self.collect().await?;
        self.close().await?;
        Ok(records)
    }
}

fn not_started() -> ReqbinError {
    ReqbinError::InvalidState("session not started".to_string())
}

fn closed() -> ReqbinError {
    ReqbinError::InvalidState("session closed".to_string())
}

/// Capture every request an async function under test sends to the URL it
/// is given
///
/// # Errors
///
/// Returns [`ReqbinError::Config`] if `settings` set no termination policy,
/// or an I/O error if the endpoint cannot be bound
pub async fn capture_requests<F, Fut>(
    settings: CaptureSettings,
    f: F,
) -> Result<Vec<RequestRecord>>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = ()>,
{
    CaptureSession::new(settings)?.capture(f).await
}

/// Blocking variant of [`capture_requests`] for synchronous code
///
/// Drives a private multi-thread runtime, so it must not be called from
/// within an async context. `f` runs on the calling thread while the
/// endpoint is served by the runtime's workers.
///
/// # Errors
///
/// Returns [`ReqbinError::Config`] if `settings` set no termination policy,
/// or an I/O error if the runtime or endpoint cannot be created
pub fn capture_requests_blocking<F>(settings: CaptureSettings, f: F) -> Result<Vec<RequestRecord>>
where
    F: FnOnce(&str),
{
    let mut session = CaptureSession::new(settings)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let url = runtime.block_on(session.start())?;
    info!("Running function under test against {}", url);
    f(&url);

    runtime.block_on(async {
        let records = session.collect().await?;
        session.close().await?;
        Ok::<_, ReqbinError>(records)
    })
}
