//! Byte-Range HTTP Abstraction
//!
//! The core consumes remote media exclusively through ranged GET requests.
//! Hosts implement [`HttpByteRangeSource`]; the desktop default lives in
//! `bridge-desktop`.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// A span of bytes inside a remote resource.
///
/// `length == None` means "from `start` to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    /// A bounded range of `length` bytes starting at `start`.
    pub fn new(start: u64, length: u64) -> Self {
        Self {
            start,
            length: Some(length),
        }
    }

    /// An open-ended range from `start` to the end of the resource.
    pub fn from_offset(start: u64) -> Self {
        Self {
            start,
            length: None,
        }
    }

    /// The whole resource.
    pub fn full() -> Self {
        Self::from_offset(0)
    }

    /// Exclusive end offset, if bounded.
    pub fn end(&self) -> Option<u64> {
        self.length.map(|len| self.start.saturating_add(len))
    }

    pub fn is_empty(&self) -> bool {
        self.length == Some(0)
    }

    pub fn is_open_ended(&self) -> bool {
        self.length.is_none()
    }

    /// Resolves an open-ended range against a known total length and clamps a
    /// bounded one so it never runs past the end.
    pub fn clamp_to(&self, total_length: u64) -> ByteRange {
        let start = self.start.min(total_length);
        let end = match self.end() {
            Some(end) => end.min(total_length),
            None => total_length,
        };
        ByteRange::new(start, end - start)
    }

    /// Value for the HTTP `Range` header (`bytes=a-b` with an inclusive end).
    pub fn header_value(&self) -> String {
        match self.end() {
            Some(end) if end > self.start => format!("bytes={}-{}", self.start, end - 1),
            _ => format!("bytes={}-", self.start),
        }
    }
}

/// A ranged GET request.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub url: String,
    pub range: ByteRange,
    pub headers: HashMap<String, String>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl RangeRequest {
    pub fn new(url: impl Into<String>, range: ByteRange) -> Self {
        Self {
            url: url.into(),
            range,
            headers: HashMap::new(),
            connect_timeout: None,
            read_timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.header("User-Agent", user_agent)
    }

    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    pub fn read_timeout(mut self, duration: Duration) -> Self {
        self.read_timeout = Some(duration);
        self
    }
}

/// Response to a [`RangeRequest`].
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: u16,
    /// Byte offset of the first byte in `body`.
    pub start: u64,
    /// Total length of the resource, when the server reported it.
    pub total_length: Option<u64>,
    pub body: Bytes,
}

impl RangeResponse {
    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `206 Partial Content`
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// The range actually covered by `body`.
    pub fn served_range(&self) -> ByteRange {
        ByteRange::new(self.start, self.body.len() as u64)
    }
}

/// Parses a `Content-Range` header value such as `bytes 0-99/1234` or
/// `bytes 0-99/*`.
///
/// Returns `(start, inclusive_end, total_length)`.
pub fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        other => Some(other.parse::<u64>().ok()?),
    };
    Some((start, end, total))
}

/// Outbound network interface for media bytes.
///
/// Implementations must honor `request.range`, apply the connect/read timeouts
/// when present, and report the total resource length whenever the server
/// exposes it (`Content-Range` total, or `Content-Length` of a full response).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{ByteRange, HttpByteRangeSource, RangeRequest};
///
/// async fn first_kilobyte(source: &dyn HttpByteRangeSource, url: &str) -> Result<Bytes> {
///     let response = source
///         .fetch_range(RangeRequest::new(url, ByteRange::new(0, 1024)))
///         .await?;
///     Ok(response.body)
/// }
/// ```
#[async_trait]
pub trait HttpByteRangeSource: Send + Sync {
    /// Fetch the requested byte range.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails or times out
    /// - The server answers with a non-success status
    async fn fetch_range(&self, request: RangeRequest) -> Result<RangeResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_for_bounded_and_open_ranges() {
        assert_eq!(ByteRange::new(0, 100).header_value(), "bytes=0-99");
        assert_eq!(ByteRange::new(50, 1).header_value(), "bytes=50-50");
        assert_eq!(ByteRange::from_offset(1024).header_value(), "bytes=1024-");
    }

    #[test]
    fn test_clamp_to_total_length() {
        assert_eq!(ByteRange::from_offset(10).clamp_to(100), ByteRange::new(10, 90));
        assert_eq!(ByteRange::new(90, 50).clamp_to(100), ByteRange::new(90, 10));
        assert_eq!(ByteRange::new(200, 5).clamp_to(100), ByteRange::new(100, 0));
        assert!(ByteRange::new(200, 5).clamp_to(100).is_empty());
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("bytes 0-99/1234"), Some((0, 99, Some(1234))));
        assert_eq!(parse_content_range("bytes 10-19/*"), Some((10, 19, None)));
        assert_eq!(parse_content_range("bytes 20-10/100"), None);
        assert_eq!(parse_content_range("items 0-1/2"), None);
    }

    #[test]
    fn test_range_request_builder() {
        let request = RangeRequest::new("https://cdn.example.com/a.mp4", ByteRange::new(0, 10))
            .user_agent("test-agent")
            .connect_timeout(Duration::from_secs(15))
            .read_timeout(Duration::from_secs(30));

        assert_eq!(request.headers.get("User-Agent"), Some(&"test-agent".to_string()));
        assert_eq!(request.connect_timeout, Some(Duration::from_secs(15)));
        assert_eq!(request.read_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_served_range_matches_body() {
        let response = RangeResponse {
            status: 206,
            start: 100,
            total_length: Some(1000),
            body: Bytes::from_static(&[0u8; 50]),
        };

        assert!(response.is_success());
        assert!(response.is_partial());
        assert_eq!(response.served_range(), ByteRange::new(100, 50));
    }
}
