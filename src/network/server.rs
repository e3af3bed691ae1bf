//! Local capture endpoint

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::capture::QueueSender;
use crate::config::CaptureConfig;
use crate::{ReqbinError, Result};

use super::{HttpHandler, SHUTDOWN_TIMEOUT_MS};

/// HTTP endpoint bound to an ephemeral loopback port
pub struct EndpointServer {
    status: StatusCode,
    max_body_size: usize,
    running: Option<Running>,
}

struct Running {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl EndpointServer {
    /// Create an endpoint for a validated configuration; nothing is bound yet
    ///
    /// # Errors
    ///
    /// Returns error if the configured status is not a valid HTTP status
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let status = StatusCode::from_u16(config.response_status_code()).map_err(|e| {
            ReqbinError::Config(format!(
                "Invalid response status code {}: {e}",
                config.response_status_code()
            ))
        })?;

        Ok(Self {
            status,
            max_body_size: config.max_body_size(),
            running: None,
        })
    }

    /// Bind the listener and start serving into `queue`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is already running or binding fails
    pub async fn start(&mut self, queue: QueueSender) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(ReqbinError::InvalidState(
                "endpoint already started".to_string(),
            ));
        }

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        // Subscribed before spawning so a stop() that runs first is not missed
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handler = HttpHandler::new(self.status, self.max_body_size, queue);
        let task = tokio::spawn(accept_loop(
            listener,
            handler,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        info!("Capture endpoint listening on {}", addr);

        self.running = Some(Running {
            addr,
            shutdown_tx,
            task,
        });
        Ok(addr)
    }

    /// Base URL of the running endpoint
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.running
            .as_ref()
            .map(|running| format!("http://{}", running.addr))
    }

    /// Stop accepting, let in-flight requests finish, then close connections
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown_tx.send(()).ok();
        if let Err(e) = running.task.await {
            warn!("Endpoint task ended abnormally: {}", e);
        }

        info!("Capture endpoint {} stopped", running.addr);
    }
}

impl Drop for EndpointServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: HttpHandler,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer_addr,
                            handler.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            Some(result) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = result {
                    warn!("Connection task failed: {}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    drop(listener);

    // In-flight requests get a bounded grace period, the rest are aborted
    let shutdown_timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
    tokio::time::timeout(shutdown_timeout, async {
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                warn!("Connection cleanup error: {}", e);
            }
        }
    })
    .await
    .ok();
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: HttpHandler,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!("Accepted connection from {}", peer_addr);

    let service = service_fn(move |request: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.handle(request).await) }
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let finished = tokio::select! {
        result = connection.as_mut() => Some(result),
        _ = shutdown_rx.recv() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        debug!("Connection from {} closed with error: {}", peer_addr, e);
    }
}
