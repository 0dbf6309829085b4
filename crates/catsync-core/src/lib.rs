//! Core library for catsync, a live cache of the storefront category list.
//!
//! The list is pulled over HTTP and kept fresh by a push channel on
//! `/ws/category-updates/`. The last good list is saved locally and served
//! when a fetch fails.
//!
//! - `api`: REST client and the `CategorySource` seam
//! - `channel`: push channel state machine, backoff and socket transport
//! - `store`: fallback snapshot storage
//! - `service`: the running sync service and its UI handle
//! - `models`: categories, the category tree and wire messages
//! - `config`: application configuration

pub mod api;
pub mod channel;
pub mod config;
pub mod models;
pub mod service;
pub mod store;

pub use api::{ApiClient, CategorySource, FetchError};
pub use channel::{ConnectionStatus, ReconnectPolicy, WsConnector};
pub use config::Config;
pub use models::{CategoryNode, CategoryTree, CategoryTreeNode};
pub use service::{CacheState, CategoryHandle, CategorySyncService, SyncDeps, SyncOptions};
pub use store::{FallbackStore, FileStore, MemoryStore};
