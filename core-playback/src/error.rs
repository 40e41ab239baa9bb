//! # Playback Error Types
//!
//! Error types for the media cache, data sources and preloading.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur in cache, data source and preload operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Key Errors
    // ========================================================================
    /// The media reference cannot be turned into a cache key.
    #[error("Invalid media key: {0:?}")]
    InvalidKey(String),

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Upstream fetch failed (connection, timeout or HTTP status).
    #[error("Network fetch failed for {uri}: {message}")]
    Network {
        uri: String,
        message: String,
        transient: bool,
    },

    /// The upstream answered with bytes that do not match the request.
    #[error("Unexpected upstream response for {uri}: {message}")]
    UnexpectedResponse { uri: String, message: String },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// A cached resource is missing bytes its index entry claims to hold.
    #[error("Cache corruption for {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    /// The persisted cache index cannot be parsed.
    #[error("Corrupt cache index at {path}: {reason}")]
    CorruptIndex { path: String, reason: String },

    /// The cache is not initialized or running in pass-through mode.
    #[error("Cache unavailable")]
    CacheUnavailable,

    // ========================================================================
    // Control Flow
    // ========================================================================
    /// The operation was canceled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Wraps a bridge failure for `uri`.
    pub fn network(uri: &str, error: BridgeError) -> Self {
        PlaybackError::Network {
            uri: uri.to_string(),
            transient: error.is_transient(),
            message: error.to_string(),
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::Network { transient: true, .. })
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Network { .. } | PlaybackError::UnexpectedResponse { .. }
        )
    }

    /// Returns `true` if this error comes from the on-disk cache.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::CacheCorruption { .. }
                | PlaybackError::CorruptIndex { .. }
                | PlaybackError::CacheUnavailable
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlaybackError::Cancelled)
    }
}

impl From<serde_json::Error> for PlaybackError {
    fn from(error: serde_json::Error) -> Self {
        PlaybackError::Serialization(error.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
