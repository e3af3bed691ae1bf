//! HTTP handler: turns each inbound request into a queued record

use std::collections::BTreeMap;

use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::{HeaderMap, Request, Response, StatusCode};
use tracing::warn;

use crate::capture::QueueSender;
use crate::record::RequestRecord;
use crate::{ReqbinError, Result};

/// Per-request handler shared by every connection of one endpoint
#[derive(Debug, Clone)]
pub struct HttpHandler {
    status: StatusCode,
    max_body_size: usize,
    queue: QueueSender,
}

impl HttpHandler {
    /// Create a handler answering with `status` and feeding `queue`
    #[must_use]
    pub fn new(status: StatusCode, max_body_size: usize, queue: QueueSender) -> Self {
        Self {
            status,
            max_body_size,
            queue,
        }
    }

    /// Handle one request
    ///
    /// The record is enqueued before the response is returned, so a client
    /// that has seen the response can rely on the record being queued. A body
    /// that cannot be read drops the request from the capture only.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Empty<Bytes>>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        match Self::read_body(body, self.max_body_size).await {
            Ok(body) => {
                let path = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
                let record = RequestRecord::new(
                    parts.method.as_str(),
                    path,
                    header_map(&parts.headers),
                    body,
                );
                self.queue.push(record);
            }
            Err(e) => {
                warn!("Dropping {} {} from capture: {}", parts.method, parts.uri, e);
            }
        }

        Self::empty_response(self.status)
    }

    /// Create an empty response
    #[must_use]
    pub fn empty_response(status: StatusCode) -> Response<Empty<Bytes>> {
        let mut response = Response::new(Empty::new());
        *response.status_mut() = status;
        response
    }

    /// Read request body with size limit
    ///
    /// # Errors
    ///
    /// Returns error if body is too large or read fails
    pub async fn read_body<B>(body: B, max_size: usize) -> Result<Bytes>
    where
        B: hyper::body::Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let collected = Limited::new(body, max_size).collect().await.map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ReqbinError::BodyTooLarge { limit: max_size }
            } else {
                ReqbinError::BodyRead(e.to_string())
            }
        })?;

        Ok(collected.to_bytes())
    }
}

/// Lowercased header names to values, in wire order
fn header_map(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::inbound_queue;
    use http_body_util::Full;
    use hyper::header::HeaderValue;

    #[test]
    fn test_empty_response() {
        let response = HttpHandler::empty_response(StatusCode::CREATED);

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_read_body() {
        let data = Bytes::from("test data");
        let body = Full::new(data.clone());

        let result = HttpHandler::read_body(body, 1024).await;
        assert_eq!(result.unwrap(), data);
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let body = Full::new(Bytes::from("test data that is too long"));

        let result = HttpHandler::read_body(body, 5).await;
        assert!(matches!(result, Err(ReqbinError::BodyTooLarge { limit: 5 })));
    }

    #[tokio::test]
    async fn test_handle_enqueues_record() {
        let (tx, mut rx) = inbound_queue();
        let handler = HttpHandler::new(StatusCode::ACCEPTED, 1024, tx);

        let request = Request::builder()
            .method("DELETE")
            .uri("/items/7?force=true")
            .header("Content-Type", "text/plain")
            .header("X-Tag", "one")
            .header("X-Tag", "two")
            .body(Full::new(Bytes::from("It's me")))
            .unwrap();

        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let record = rx.try_recv().unwrap();
        assert_eq!(record.method, "DELETE");
        assert_eq!(record.path, "/items/7?force=true");
        assert_eq!(record.header("content-type"), Some("text/plain"));
        assert_eq!(
            record.header_values("x-tag").unwrap(),
            &["one".to_string(), "two".to_string()]
        );
        assert_eq!(record.body_text(), "It's me");
    }

    #[tokio::test]
    async fn test_obs_text_header_replaced() {
        let (tx, mut rx) = inbound_queue();
        let handler = HttpHandler::new(StatusCode::OK, 1024, tx);

        let request = Request::builder()
            .uri("/")
            .header("X-Raw", HeaderValue::from_bytes(b"caf\xe9").unwrap())
            .body(Full::new(Bytes::new()))
            .unwrap();

        handler.handle(request).await;

        let record = rx.try_recv().unwrap();
        assert_eq!(record.header("x-raw"), Some("caf\u{fffd}"));
    }

    #[tokio::test]
    async fn test_handle_after_queue_closed() {
        let (tx, rx) = inbound_queue();
        let handler = HttpHandler::new(StatusCode::CREATED, 1024, tx);
        rx.close();

        let request = Request::builder()
            .method("POST")
            .uri("/late")
            .body(Full::new(Bytes::from("after close")))
            .unwrap();

        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_handle_drops_oversized_body() {
        let (tx, mut rx) = inbound_queue();
        let handler = HttpHandler::new(StatusCode::OK, 4, tx);

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Full::new(Bytes::from("far too long")))
            .unwrap();

        let response = handler.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_none());
    }
}
