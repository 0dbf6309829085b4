//! REST access to the storefront's category endpoints.
//!
//! `CategorySource` is the seam the sync service fetches through;
//! `ApiClient` is the reqwest-backed implementation.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::CategoryNode;

pub use client::{parse_category_listing, ApiClient};
pub use error::FetchError;

/// Pull side of the cache: returns the active top-level categories,
/// already ordered for display.
#[async_trait]
pub trait CategorySource: Send + Sync {
    async fn fetch_categories(&self) -> Result<Vec<CategoryNode>, FetchError>;
}
