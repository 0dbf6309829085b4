//! Plain-text rendering for the terminal.

use catsync_core::{CacheState, CategoryNode, CategoryTree, CategoryTreeNode, ConnectionStatus};
use chrono::{DateTime, Local, Utc};

/// Width of the name column in category listings
const NAME_WIDTH: usize = 32;

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "live",
    }
}

pub fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "never".to_string(),
    }
}

pub fn format_category_row(category: &CategoryNode) -> String {
    format!(
        "{:>6}  {:<width$}  {}",
        category.id,
        truncate_string(&category.name, NAME_WIDTH),
        category.slug.as_deref().unwrap_or("-"),
        width = NAME_WIDTH
    )
}

pub fn render_categories(categories: &[CategoryNode]) -> String {
    if categories.is_empty() {
        return "  (no categories)".to_string();
    }
    categories
        .iter()
        .map(format_category_row)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_state(state: &CacheState) -> String {
    let mut status = format!(
        "[{}] {} categories, fetched {}",
        status_label(state.connection_status),
        state.categories.len(),
        format_timestamp(state.last_fetched_at)
    );
    if state.reconnect_attempt > 0 {
        status.push_str(&format!(", reconnect attempt {}", state.reconnect_attempt));
    }
    if state.is_loading {
        status.push_str(", loading");
    }
    let mut out = vec![status];
    if let Some(error) = &state.error {
        out.push(format!("  ! {}", error));
    }
    out.push(render_categories(&state.categories));
    out.join("\n")
}

/// Tree as an indented outline; the selected branch is marked with `>`.
pub fn render_tree(tree: &CategoryTree) -> String {
    let mut lines = Vec::new();
    for parent in tree.nodes() {
        push_tree_line(&mut lines, parent, 0, tree.selected_parent() == Some(parent.id));
        if tree.selected_parent() == Some(parent.id) {
            for child in &parent.children {
                let selected = tree.selected_child() == Some(child.id);
                push_tree_line(&mut lines, child, 1, selected);
            }
        } else if !parent.children.is_empty() {
            lines.push(format!("    ({} subcategories)", parent.children.len()));
        }
    }
    if lines.is_empty() {
        "  (empty tree)".to_string()
    } else {
        lines.join("\n")
    }
}

fn push_tree_line(lines: &mut Vec<String>, node: &CategoryTreeNode, depth: usize, selected: bool) {
    let marker = if selected { ">" } else { " " };
    lines.push(format!(
        "{} {}{} [{}]",
        marker,
        "  ".repeat(depth),
        truncate_string(&node.name, NAME_WIDTH),
        node.id
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_node(id: i64, name: &str, children: Vec<CategoryTreeNode>) -> CategoryTreeNode {
        CategoryTreeNode {
            id,
            name: name.to_string(),
            slug: None,
            children,
        }
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Électronique", 6), "Éle...");
    }

    #[test]
    fn test_render_state_shows_error_and_status() {
        let state = CacheState {
            error: Some("Failed to load categories: timeout".to_string()),
            reconnect_attempt: 2,
            ..CacheState::default()
        };
        let out = render_state(&state);
        assert!(out.starts_with("[disconnected] 0 categories, fetched never, reconnect attempt 2"));
        assert!(out.contains("! Failed to load categories: timeout"));
        assert!(out.contains("(no categories)"));
    }

    #[test]
    fn test_render_tree_expands_selected_parent() {
        let mut tree = CategoryTree::new(vec![
            tree_node(1, "Shoes", vec![tree_node(11, "Boots", vec![])]),
            tree_node(2, "Bags", vec![tree_node(21, "Totes", vec![])]),
        ]);
        tree.select_parent(Some(1));
        tree.select_child(Some(11));

        let out = render_tree(&tree);
        assert!(out.contains(">   Boots [11]"));
        assert!(out.contains("> Shoes [1]"));
        assert!(out.contains("(1 subcategories)"));
        assert!(!out.contains("Totes"));
    }
}
