use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// A single storefront category as served by `/products/categories/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CategoryNode {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_active: bool,
    #[serde(default, alias = "parent_id")]
    pub parent: Option<i64>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub order: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}

fn null_as_zero<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(d)?.unwrap_or(0))
}

impl CategoryNode {
    /// Top-level categories have no parent reference.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether this node belongs in the visible category bar.
    pub fn is_visible(&self) -> bool {
        self.is_active && self.is_top_level()
    }
}

/// Keep active top-level nodes and order them by `order`.
///
/// The sort is stable, so nodes sharing an `order` keep their source order.
pub fn active_top_level(nodes: impl IntoIterator<Item = CategoryNode>) -> Vec<CategoryNode> {
    let mut visible: Vec<CategoryNode> = nodes.into_iter().filter(CategoryNode::is_visible).collect();
    visible.sort_by_key(|c| c.order);
    visible
}

/// Read raw JSON entries into nodes, skipping nulls and entries that don't
/// look like a category. One bad row shouldn't blank the whole menu.
pub fn nodes_from_values(values: Vec<Value>) -> Vec<CategoryNode> {
    values
        .into_iter()
        .filter(|v| !v.is_null())
        .filter_map(|v| match serde_json::from_value::<CategoryNode>(v) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable category entry");
                None
            }
        })
        .collect()
}
