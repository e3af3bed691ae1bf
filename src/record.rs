//! Captured representation of one inbound HTTP request

use std::borrow::Cow;
use std::collections::BTreeMap;

use bytes::Bytes;

/// One request received by the capture endpoint
///
/// Header names are stored lowercased; values keep the order in which they
/// appeared on the wire. Header values that are not valid UTF-8 (obs-text)
/// are stored with the invalid bytes replaced by U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// HTTP method (e.g. "POST")
    pub method: String,
    /// Path and query of the request URI
    pub path: String,
    /// Header name to values
    pub headers: BTreeMap<String, Vec<String>>,
    /// Raw request body
    pub body: Bytes,
}

impl RequestRecord {
    /// Create a record from its parts
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: BTreeMap<String, Vec<String>>,
        body: Bytes,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
            body,
        }
    }

    /// First value of a header, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a header, matched case-insensitively
    #[must_use]
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Body as text, with invalid UTF-8 replaced
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
