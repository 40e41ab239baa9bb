//! Playback-facing data source abstraction.

use crate::cache::CacheKey;
use crate::error::Result;
use async_trait::async_trait;
use bridge_traits::http::ByteRange;
use bytes::Bytes;
use core_async::sync::CancellationToken;

/// Byte-addressable media the player reads from.
///
/// Implementations either read through the on-disk cache
/// ([`CachingDataSource`](super::CachingDataSource)) or go straight to the
/// network ([`NetworkDataSource`](super::NetworkDataSource)). Reads of an
/// open-ended range continue to the end of the resource.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The media URI this source was created for.
    fn uri(&self) -> &str;

    fn key(&self) -> &CacheKey;

    /// Whether reads are written back to the cache.
    fn is_cache_backed(&self) -> bool;

    /// Total length of the resource, discovering it upstream if needed.
    async fn content_length(&self, cancel: &CancellationToken) -> Result<Option<u64>>;

    /// Reads `range`, stopping early with [`PlaybackError::Cancelled`]
    /// when `cancel` fires.
    ///
    /// [`PlaybackError::Cancelled`]: crate::error::PlaybackError::Cancelled
    async fn read_with_cancel(&self, range: ByteRange, cancel: &CancellationToken)
        -> Result<Bytes>;

    async fn read(&self, range: ByteRange) -> Result<Bytes> {
        self.read_with_cancel(range, &CancellationToken::new()).await
    }
}
