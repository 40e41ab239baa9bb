//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpByteRangeSource` using `reqwest`
//!
//! Clocks and console logging come straight from `bridge-traits`
//! (`SystemClock`, `ConsoleLogger`).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestRangeSource;
//! use std::sync::Arc;
//!
//! let upstream = Arc::new(ReqwestRangeSource::new()?);
//! // Hand `upstream` to the media service.
//! ```

mod http;

pub use http::ReqwestRangeSource;
