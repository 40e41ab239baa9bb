//! # Host Bridge Traits
//!
//! Contracts between the feed media core and the host platform.
//!
//! ## Overview
//!
//! The core never talks to the network or the wall clock directly. Each
//! capability it needs is expressed here as a trait so that hosts (desktop,
//! mobile shells, tests) can plug in their own implementation.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpByteRangeSource`](http::HttpByteRangeSource) - Byte-range fetches of remote media
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors into it and keep the
//! request URL or status code in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across preload tasks.
//!
//! ## Examples
//!
//! ### Implementing HttpByteRangeSource
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::http::{HttpByteRangeSource, RangeRequest, RangeResponse};
//!
//! pub struct MyRangeSource {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpByteRangeSource for MyRangeSource {
//!     async fn fetch_range(&self, request: RangeRequest) -> Result<RangeResponse> {
//!         // Issue a GET with a `Range` header and map the response.
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteRange, HttpByteRangeSource, RangeRequest, RangeResponse};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
