use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CategoryNode;

/// The last good category list and when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    pub categories: Vec<CategoryNode>,
    pub cached_at: DateTime<Utc>,
}

impl CategorySnapshot {
    pub fn new(categories: Vec<CategoryNode>, cached_at: DateTime<Utc>) -> Self {
        Self {
            categories,
            cached_at,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }
}

/// Format an age in minutes as "just now", "5m ago", "2h ago" or "3d ago".
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Negative means clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-3), "just now");
        assert_eq!(age_display(0), "just now");
        assert_eq!(age_display(5), "5m ago");
        assert_eq!(age_display(89), "1h ago");
        assert_eq!(age_display(90), "2h ago");
        assert_eq!(age_display(1440 + 11 * 60), "1d ago");
        assert_eq!(age_display(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_snapshot_age() {
        let snapshot = CategorySnapshot::new(vec![], Utc::now() - Duration::minutes(30));
        assert_eq!(snapshot.age_display(), "30m ago");
    }
}
