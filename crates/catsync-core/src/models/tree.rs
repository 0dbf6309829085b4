//! Nested category tree and the parent/child selection used by the
//! category filter sidebar.

use serde::{Deserialize, Serialize};

/// A node of `/products/categories/tree/`. Children arrive already filtered
/// to active entries and ordered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CategoryTreeNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub children: Vec<CategoryTreeNode>,
}

/// Tree plus the current two-level selection.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    tree: Vec<CategoryTreeNode>,
    selected_parent: Option<i64>,
    selected_child: Option<i64>,
}

impl CategoryTree {
    pub fn new(tree: Vec<CategoryTreeNode>) -> Self {
        Self {
            tree,
            ..Self::default()
        }
    }

    pub fn nodes(&self) -> &[CategoryTreeNode] {
        &self.tree
    }

    /// Replace the tree. A selection that no longer exists is dropped.
    pub fn set_tree(&mut self, tree: Vec<CategoryTreeNode>) {
        self.tree = tree;
        if self.selected_parent_node().is_none() {
            self.selected_parent = None;
            self.selected_child = None;
        } else if self.selected_child_node().is_none() {
            self.selected_child = None;
        }
    }

    /// Select a top-level category; always clears the child selection.
    pub fn select_parent(&mut self, id: Option<i64>) {
        self.selected_parent = id;
        self.selected_child = None;
    }

    pub fn select_child(&mut self, id: Option<i64>) {
        self.selected_child = id;
    }

    pub fn selected_parent(&self) -> Option<i64> {
        self.selected_parent
    }

    pub fn selected_child(&self) -> Option<i64> {
        self.selected_child
    }

    pub fn selected_parent_node(&self) -> Option<&CategoryTreeNode> {
        let id = self.selected_parent?;
        self.tree.iter().find(|n| n.id == id)
    }

    pub fn selected_child_node(&self) -> Option<&CategoryTreeNode> {
        let id = self.selected_child?;
        self.selected_parent_node()?
            .children
            .iter()
            .find(|n| n.id == id)
    }

    /// The most specific selected category, for product list filtering.
    pub fn active_filter(&self) -> Option<i64> {
        self.selected_child.or(self.selected_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<CategoryTreeNode> {
        serde_json::from_str(
            r#"[
                {"id": 1, "name": "Men", "slug": "men", "children": [
                    {"id": 11, "name": "Shirts", "slug": "men-shirts", "children": []},
                    {"id": 12, "name": "Pants", "slug": "men-pants", "children": []}
                ]},
                {"id": 2, "name": "Women", "slug": "women", "children": []}
            ]"#,
        )
        .expect("Failed to parse tree test JSON")
    }

    #[test]
    fn test_select_parent_clears_child() {
        let mut tree = CategoryTree::new(sample_tree());
        tree.select_parent(Some(1));
        tree.select_child(Some(12));
        assert_eq!(tree.active_filter(), Some(12));
        assert_eq!(tree.selected_child_node().map(|n| n.name.as_str()), Some("Pants"));

        tree.select_parent(Some(2));
        assert_eq!(tree.selected_child(), None);
        assert_eq!(tree.active_filter(), Some(2));
    }

    #[test]
    fn test_set_tree_drops_stale_selection() {
        let mut tree = CategoryTree::new(sample_tree());
        tree.select_parent(Some(1));
        tree.select_child(Some(11));

        let mut updated = sample_tree();
        updated[0].children.retain(|c| c.id != 11);
        tree.set_tree(updated);
        assert_eq!(tree.selected_parent(), Some(1));
        assert_eq!(tree.selected_child(), None);

        tree.set_tree(vec![]);
        assert_eq!(tree.selected_parent(), None);
        assert!(tree.nodes().is_empty());
    }
}
