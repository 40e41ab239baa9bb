//! Byte-range source implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{parse_content_range, ByteRange, HttpByteRangeSource, RangeRequest, RangeResponse},
};
use bytes::{Bytes, BytesMut};
use core_async::time::{timeout, Duration};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

/// Reqwest-based byte-range source
///
/// Provides:
/// - Connection pooling via reqwest
/// - `Range` requests with `Content-Range` / `Content-Length` parsing
/// - A connect timeout around request dispatch and a read timeout between
///   body chunks
pub struct ReqwestRangeSource {
    client: Client,
    default_user_agent: String,
}

impl ReqwestRangeSource {
    pub const DEFAULT_USER_AGENT: &'static str = "FeedMedia-Rust/0.1";

    /// Create a source with the default connection settings
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(15))
    }

    /// Create a source whose underlying client uses `connect_timeout`
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            default_user_agent: Self::DEFAULT_USER_AGENT.to_string(),
        }
    }

    fn build_request(&self, request: &RangeRequest) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(&request.url)
            .header(RANGE, request.range.header_value());

        if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
            req = req.header(reqwest::header::USER_AGENT, &self.default_user_agent);
        }

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        req
    }

    fn map_send_error(url: &str, error: reqwest::Error, timeout_ms: u64) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout {
                url: url.to_string(),
                timeout_ms,
            }
        } else if error.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", error))
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }

    async fn read_body(
        url: &str,
        response: reqwest::Response,
        read_timeout: Option<Duration>,
        limit: Option<u64>,
    ) -> Result<Bytes> {
        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();

        loop {
            let next = match read_timeout {
                Some(limit) => timeout(limit, stream.next()).await.map_err(|_| {
                    BridgeError::Timeout {
                        url: url.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    }
                })?,
                None => stream.next().await,
            };

            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
            body.extend_from_slice(&chunk);

            // Servers that ignore `Range` send the whole resource; stop early.
            if let Some(limit) = limit {
                if body.len() as u64 >= limit {
                    break;
                }
            }
        }

        Ok(body.freeze())
    }
}

#[async_trait]
impl HttpByteRangeSource for ReqwestRangeSource {
    async fn fetch_range(&self, request: RangeRequest) -> Result<RangeResponse> {
        debug!(
            url = %request.url,
            range = %request.range.header_value(),
            "Fetching byte range"
        );

        let send = self.build_request(&request).send();
        let response = match request.connect_timeout {
            Some(limit) => timeout(limit, send)
                .await
                .map_err(|_| BridgeError::Timeout {
                    url: request.url.clone(),
                    timeout_ms: limit.as_millis() as u64,
                })?
                .map_err(|e| Self::map_send_error(&request.url, e, limit.as_millis() as u64))?,
            None => send
                .await
                .map_err(|e| Self::map_send_error(&request.url, e, 0))?,
        };

        let status = response.status();
        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_range = header(CONTENT_RANGE);
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok());

        match status {
            StatusCode::PARTIAL_CONTENT => {
                let (start, _, total) = content_range
                    .as_deref()
                    .and_then(parse_content_range)
                    .unwrap_or((request.range.start, 0, None));
                let body = Self::read_body(&request.url, response, request.read_timeout, None).await?;

                Ok(RangeResponse {
                    status: status.as_u16(),
                    start,
                    total_length: total,
                    body,
                })
            }
            StatusCode::OK => {
                // Full response: the server ignored `Range`, trim to the request.
                let wanted_end = request.range.end();
                let body =
                    Self::read_body(&request.url, response, request.read_timeout, wanted_end)
                        .await?;
                let total =
                    content_length.or_else(|| wanted_end.is_none().then_some(body.len() as u64));
                let served = request.range.clamp_to(body.len() as u64);
                let end = served.end().unwrap_or(served.start) as usize;

                Ok(RangeResponse {
                    status: status.as_u16(),
                    start: served.start,
                    total_length: total,
                    body: body.slice(served.start as usize..end),
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                // `Content-Range: bytes */<total>`
                let total = content_range
                    .as_deref()
                    .and_then(|v| v.rsplit_once('/'))
                    .and_then(|(_, total)| total.trim().parse::<u64>().ok());

                Ok(RangeResponse {
                    status: status.as_u16(),
                    start: request.range.start,
                    total_length: total,
                    body: Bytes::new(),
                })
            }
            other => {
                warn!(url = %request.url, status = other.as_u16(), "Range request failed");
                Err(BridgeError::HttpStatus {
                    status: other.as_u16(),
                    url: request.url,
                })
            }
        }
    }
}
