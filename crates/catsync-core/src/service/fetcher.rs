use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::CategorySource;
use crate::models::CategoryNode;
use crate::store::{CategorySnapshot, FallbackStore};

/// Result of one fetch, ready to fold into `CacheState`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched {
        categories: Vec<CategoryNode>,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        /// Last saved snapshot, if one could be read.
        fallback: Option<CategorySnapshot>,
    },
}

/// Pulls the category list and keeps the fallback snapshot in step with it.
pub struct CategoryFetcher {
    source: Arc<dyn CategorySource>,
    store: Arc<dyn FallbackStore>,
}

impl CategoryFetcher {
    pub fn new(source: Arc<dyn CategorySource>, store: Arc<dyn FallbackStore>) -> Self {
        Self { source, store }
    }

    pub async fn fetch(&self) -> FetchOutcome {
        match self.source.fetch_categories().await {
            Ok(categories) => {
                let fetched_at = Utc::now();
                info!(count = categories.len(), "Fetched categories");
                self.store
                    .save(&CategorySnapshot::new(categories.clone(), fetched_at));
                FetchOutcome::Fetched {
                    categories,
                    fetched_at,
                }
            }
            Err(e) => {
                warn!(error = %e, network = e.is_network(), "Category fetch failed");
                FetchOutcome::Failed {
                    error: format!("Failed to load categories: {}", e),
                    fallback: self.store.load(),
                }
            }
        }
    }
}
