//! Data models for the category cache.
//!
//! - `CategoryNode`: a flat category row from the listing endpoint
//! - `CategoryTreeNode`, `CategoryTree`: nested tree and sidebar selection
//! - `ServerMessage`, `ClientMessage`, `Inbound`: push channel wire types

pub mod category;
pub mod message;
pub mod tree;

pub use category::{active_top_level, nodes_from_values, CategoryNode};
pub use message::{CategoryUpdate, ClientMessage, Inbound, ServerMessage, UpdateAction};
pub use tree::{CategoryTree, CategoryTreeNode};
