//! # Data Sources
//!
//! What the player reads from. [`CachingDataSourceFactory::create`] returns a
//! cache-backed source while a store is open and a network-only one in
//! pass-through mode; both satisfy [`DataSource`].

pub mod caching;
pub mod factory;
pub mod network;
pub mod options;
pub mod traits;

pub use caching::CachingDataSource;
pub use factory::CachingDataSourceFactory;
pub use network::NetworkDataSource;
pub use options::{DataSourceOptions, FetchStats, FetchStatsSnapshot};
pub use traits::DataSource;
