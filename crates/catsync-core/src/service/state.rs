use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::channel::ConnectionStatus;
use crate::models::CategoryNode;

use super::FetchOutcome;

/// Everything the UI reads about the category bar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CacheState {
    /// Active top-level categories in display order.
    pub categories: Vec<CategoryNode>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub connection_status: ConnectionStatus,
    pub reconnect_attempt: u32,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl CacheState {
    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    pub fn remove_category(&mut self, id: i64) {
        let before = self.categories.len();
        self.categories.retain(|c| c.id != id);
        debug!(id, removed = before - self.categories.len(), "Removed category locally");
    }

    pub fn replace_categories(&mut self, categories: Vec<CategoryNode>) {
        self.categories = categories;
    }

    pub fn apply_fetch(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Fetched {
                categories,
                fetched_at,
            } => {
                self.categories = categories;
                self.last_fetched_at = Some(fetched_at);
                self.error = None;
            }
            FetchOutcome::Failed { error, fallback } => {
                self.error = Some(error);
                if let Some(snapshot) = fallback {
                    debug!(cached = %snapshot.age_display(), "Restored categories from fallback snapshot");
                    self.categories = snapshot.categories;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CategorySnapshot;

    fn node(id: i64) -> CategoryNode {
        serde_json::from_value(serde_json::json!({"id": id, "is_active": true}))
            .expect("node")
    }

    #[test]
    fn test_remove_category() {
        let mut state = CacheState {
            categories: vec![node(1), node(2), node(3)],
            ..CacheState::default()
        };
        state.remove_category(2);
        let ids: Vec<i64> = state.categories.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);

        state.remove_category(42);
        assert_eq!(state.categories.len(), 2);
    }

    #[test]
    fn test_failed_fetch_without_fallback_keeps_list() {
        let mut state = CacheState {
            categories: vec![node(1)],
            ..CacheState::default()
        };
        state.apply_fetch(FetchOutcome::Failed {
            error: "Failed to load categories: timeout".to_string(),
            fallback: None,
        });
        assert_eq!(state.categories.len(), 1);
        assert!(state.error.is_some());
    }

    #[test]
    fn test_failed_fetch_uses_fallback() {
        let mut state = CacheState::default();
        state.apply_fetch(FetchOutcome::Failed {
            error: "Failed to load categories: refused".to_string(),
            fallback: Some(CategorySnapshot::new(vec![node(7)], Utc::now())),
        });
        assert_eq!(state.categories, vec![node(7)]);
        assert_eq!(state.last_fetched_at, None);
    }

    #[test]
    fn test_success_clears_error() {
        let mut state = CacheState {
            error: Some("stale".to_string()),
            ..CacheState::default()
        };
        let now = Utc::now();
        state.apply_fetch(FetchOutcome::Fetched {
            categories: vec![node(1)],
            fetched_at: now,
        });
        assert_eq!(state.error, None);
        assert_eq!(state.last_fetched_at, Some(now));
    }
}
