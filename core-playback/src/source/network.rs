//! Network-only data source.

use crate::cache::CacheKey;
use crate::error::{PlaybackError, Result};
use crate::source::options::{DataSourceOptions, FetchStats};
use crate::source::traits::DataSource;
use async_trait::async_trait;
use bridge_traits::http::{ByteRange, HttpByteRangeSource, RangeRequest, RangeResponse};
use bytes::{Bytes, BytesMut};
use core_async::sync::CancellationToken;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Reads media straight from the upstream in `chunk_size` pieces.
///
/// Used on its own in pass-through mode and as the miss path of
/// [`CachingDataSource`](super::CachingDataSource).
pub struct NetworkDataSource {
    uri: String,
    key: CacheKey,
    upstream: Arc<dyn HttpByteRangeSource>,
    options: DataSourceOptions,
    stats: Arc<FetchStats>,
    total_length: Mutex<Option<u64>>,
}

impl NetworkDataSource {
    pub fn new(
        uri: impl Into<String>,
        key: CacheKey,
        upstream: Arc<dyn HttpByteRangeSource>,
        options: DataSourceOptions,
        stats: Arc<FetchStats>,
    ) -> Self {
        Self {
            uri: uri.into(),
            key,
            upstream,
            options,
            stats,
            total_length: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    /// Total length learned from earlier responses.
    pub fn known_length(&self) -> Option<u64> {
        *self.total_length.lock()
    }

    /// Issues a single ranged request, racing it against `cancel`.
    pub(crate) async fn fetch(
        &self,
        range: ByteRange,
        cancel: &CancellationToken,
    ) -> Result<RangeResponse> {
        if cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        let request = RangeRequest::new(self.uri.clone(), range)
            .user_agent(self.options.user_agent.clone())
            .connect_timeout(self.options.connect_timeout)
            .read_timeout(self.options.read_timeout);

        trace!(uri = %redact_url(&self.uri), range = %range.header_value(), "Fetching range");

        let response = core_async::select! {
            _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
            result = self.upstream.fetch_range(request) => {
                result.map_err(|e| PlaybackError::network(&self.uri, e))?
            }
        };

        self.stats.record_network(response.body.len() as u64);

        if !response.body.is_empty() && response.start != range.start {
            return Err(PlaybackError::UnexpectedResponse {
                uri: redact_url(&self.uri).to_string(),
                message: format!(
                    "requested offset {} but received {}",
                    range.start, response.start
                ),
            });
        }

        if let Some(total) = response.total_length {
            *self.total_length.lock() = Some(total);
        }

        Ok(response)
    }
}

#[async_trait]
impl DataSource for NetworkDataSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn key(&self) -> &CacheKey {
        &self.key
    }

    fn is_cache_backed(&self) -> bool {
        false
    }

    async fn content_length(&self, cancel: &CancellationToken) -> Result<Option<u64>> {
        if let Some(total) = self.known_length() {
            return Ok(Some(total));
        }
        let response = self.fetch(ByteRange::new(0, 1), cancel).await?;
        Ok(response.total_length)
    }

    async fn read_with_cancel(
        &self,
        range: ByteRange,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let chunk = self.options.chunk_size as u64;
        let mut end = match (range.end(), self.known_length()) {
            (Some(end), Some(total)) => Some(end.min(total)),
            (end, total) => end.or(total),
        };
        let mut out = BytesMut::new();
        let mut pos = range.start;

        loop {
            if end.is_some_and(|end| pos >= end) {
                break;
            }
            let want = end.map_or(chunk, |end| (end - pos).min(chunk));

            let response = self.fetch(ByteRange::new(pos, want), cancel).await?;
            if let Some(total) = response.total_length {
                end = Some(end.map_or(total, |end| end.min(total)));
            }
            if response.body.is_empty() {
                break;
            }

            pos += response.body.len() as u64;
            out.extend_from_slice(&response.body);
        }

        debug!(
            uri = %redact_url(&self.uri),
            bytes = out.len(),
            "Network read complete"
        );
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        Upstream {}

        #[async_trait]
        impl HttpByteRangeSource for Upstream {
            async fn fetch_range(&self, request: RangeRequest) -> BridgeResult<RangeResponse>;
        }
    }

    const URI: &str = "https://cdn.example.com/v/1.mp4";

    fn source(upstream: MockUpstream, options: DataSourceOptions) -> NetworkDataSource {
        NetworkDataSource::new(
            URI,
            CacheKey::from_uri(URI).unwrap(),
            Arc::new(upstream),
            options,
            Arc::new(FetchStats::default()),
        )
    }

    #[core_async::test]
    async fn test_request_carries_range_and_user_agent() {
        let mut upstream = MockUpstream::new();
        upstream
            .expect_fetch_range()
            .times(1)
            .withf(|req| {
                req.url == URI
                    && req.range == ByteRange::new(0, 4)
                    && req.headers.get("User-Agent").map(String::as_str) == Some("FeedMedia-Rust/0.1")
                    && req.connect_timeout == Some(std::time::Duration::from_secs(15))
            })
            .returning(|req| {
                Ok(RangeResponse {
                    status: 206,
                    start: req.range.start,
                    total_length: Some(4),
                    body: Bytes::from_static(&[1, 2, 3, 4]),
                })
            });

        let source = source(upstream, DataSourceOptions::default());
        let data = source.read(ByteRange::new(0, 4)).await.unwrap();

        assert_eq!(&data[..], &[1, 2, 3, 4]);
        assert_eq!(source.known_length(), Some(4));
    }

    #[core_async::test]
    async fn test_open_ended_read_follows_chunks_to_end() {
        let body: Vec<u8> = (0..10).collect();
        let mut upstream = MockUpstream::new();
        upstream
            .expect_fetch_range()
            .times(3)
            .returning(move |req| {
                let start = req.range.start as usize;
                let end = req.range.end().map_or(body.len(), |e| (e as usize).min(body.len()));
                Ok(RangeResponse {
                    status: 206,
                    start: req.range.start,
                    total_length: Some(body.len() as u64),
                    body: Bytes::copy_from_slice(&body[start..end]),
                })
            });

        let source = source(upstream, DataSourceOptions::default().with_chunk_size(4));
        let data = source.read(ByteRange::full()).await.unwrap();

        assert_eq!(data.len(), 10);
        assert_eq!(data[9], 9);
    }

    #[core_async::test]
    async fn test_http_error_maps_to_network_error() {
        let mut upstream = MockUpstream::new();
        upstream.expect_fetch_range().times(1).returning(|req| {
            Err(BridgeError::HttpStatus {
                status: 404,
                url: req.url,
            })
        });

        let source = source(upstream, DataSourceOptions::default());
        let err = source.read(ByteRange::new(0, 10)).await.unwrap_err();

        assert!(err.is_network_error());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_misaligned_response_is_rejected() {
        let mut upstream = MockUpstream::new();
        upstream.expect_fetch_range().times(1).returning(|_| {
            Ok(RangeResponse {
                status: 200,
                start: 0,
                total_length: Some(100),
                body: Bytes::from_static(&[0; 10]),
            })
        });

        let source = source(upstream, DataSourceOptions::default());
        let err = source.read(ByteRange::new(50, 10)).await.unwrap_err();

        assert!(matches!(err, PlaybackError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_fetch() {
        let mut upstream = MockUpstream::new();
        upstream.expect_fetch_range().times(0);

        let source = source(upstream, DataSourceOptions::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = source
            .read_with_cancel(ByteRange::new(0, 10), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
