//! Read-through caching data source.

use crate::cache::{CacheHandle, CacheKey, WriteOutcome};
use crate::error::{PlaybackError, Result};
use crate::source::network::NetworkDataSource;
use crate::source::options::FetchStats;
use crate::source::traits::DataSource;
use async_trait::async_trait;
use bridge_traits::http::ByteRange;
use bytes::{Bytes, BytesMut};
use core_async::sync::CancellationToken;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Serves cached spans from disk and fills gaps from the network, writing
/// fetched bytes back as they arrive.
pub struct CachingDataSource {
    network: NetworkDataSource,
    handle: CacheHandle,
    stats: Arc<FetchStats>,
}

impl CachingDataSource {
    pub fn new(network: NetworkDataSource, handle: CacheHandle, stats: Arc<FetchStats>) -> Self {
        Self {
            network,
            handle,
            stats,
        }
    }

    pub fn handle(&self) -> &CacheHandle {
        &self.handle
    }

    fn known_length(&self) -> Option<u64> {
        self.handle
            .total_length()
            .or_else(|| self.network.known_length())
    }

    async fn read_through(&self, range: ByteRange, cancel: &CancellationToken) -> Result<Bytes> {
        let chunk = self.network.options().chunk_size as u64;
        let mut end = match (range.end(), self.known_length()) {
            (Some(end), Some(total)) => Some(end.min(total)),
            (end, total) => end.or(total),
        };
        let mut out = BytesMut::new();
        let mut pos = range.start;

        loop {
            if cancel.is_cancelled() {
                return Err(PlaybackError::Cancelled);
            }
            if end.is_some_and(|end| pos >= end) {
                break;
            }
            let want = end.map_or(chunk, |end| (end - pos).min(chunk));

            if let Some(cached) = self.handle.read_cached(ByteRange::new(pos, want))? {
                if !cached.is_empty() {
                    trace!(offset = pos, len = cached.len(), "Cache hit");
                    self.stats.record_cache_hit(cached.len() as u64);
                    pos += cached.len() as u64;
                    out.extend_from_slice(&cached);
                    continue;
                }
            }

            // `pos` is not cached, so the gap starts here and stops at the
            // next cached span.
            let fetch_len = self
                .handle
                .next_gap(ByteRange::new(pos, want))
                .and_then(|gap| gap.length)
                .unwrap_or(want)
                .min(want);

            let response = self
                .network
                .fetch(ByteRange::new(pos, fetch_len), cancel)
                .await?;
            if let Some(total) = response.total_length {
                end = Some(end.map_or(total, |end| end.min(total)));
            }
            if response.body.is_empty() {
                break;
            }

            if cancel.is_cancelled() {
                return Err(PlaybackError::Cancelled);
            }
            self.write_back(pos, &response.body, response.total_length);

            pos += response.body.len() as u64;
            out.extend_from_slice(&response.body);
        }

        Ok(out.freeze())
    }

    fn write_back(&self, offset: u64, body: &[u8], total_length: Option<u64>) {
        match self.handle.write(offset, body) {
            Ok(WriteOutcome::Skipped { required, capacity }) => {
                debug!(required, capacity, "Resource exceeds cache capacity, serving uncached");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    uri = %redact_url(self.network.uri()),
                    error = %e,
                    "Failed to write fetched bytes to cache"
                );
            }
        }
        if let Some(total) = total_length {
            self.handle.set_total_length(total);
        }
    }
}

#[async_trait]
impl DataSource for CachingDataSource {
    fn uri(&self) -> &str {
        self.network.uri()
    }

    fn key(&self) -> &CacheKey {
        self.handle.key()
    }

    fn is_cache_backed(&self) -> bool {
        true
    }

    async fn content_length(&self, cancel: &CancellationToken) -> Result<Option<u64>> {
        if let Some(total) = self.known_length() {
            return Ok(Some(total));
        }
        let total = self.network.content_length(cancel).await?;
        if let Some(total) = total {
            self.handle.set_total_length(total);
        }
        Ok(total)
    }

    async fn read_with_cancel(
        &self,
        range: ByteRange,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        match self.read_through(range, cancel).await {
            Err(PlaybackError::CacheCorruption { key, reason })
                if self.network.options().ignore_cache_on_error =>
            {
                warn!(
                    key = %redact_url(&key),
                    %reason,
                    "Corrupt cache entry, dropping and refetching"
                );
                if let Err(e) = self.handle.remove() {
                    warn!(error = %e, "Failed to drop corrupt cache entry");
                }
                self.read_through(range, cancel).await
            }
            other => other,
        }
    }
}
