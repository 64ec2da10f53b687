//! Node Views
//!
//! Serializable projection of a node's externally visible fields, handed to
//! the request-handling collaborator (or printed by the CLI).

use crate::store::Node;
use crate::types::{NodeId, NodeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External shape of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub parent_id: Option<NodeId>,
    pub size: i64,
    pub permissions: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub is_trashed: bool,
    pub trashed_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

impl From<Node> for NodeView {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            name: node.name,
            node_type: node.node_type,
            parent_id: node.parent_id,
            size: node.size,
            permissions: node.permissions,
            created_at: node.created_at,
            modified_at: node.modified_at,
            is_trashed: node.is_trashed,
            trashed_at: node.trashed_at,
            content: node.content,
        }
    }
}

/// Project a whole listing.
pub fn to_views(nodes: Vec<Node>) -> Vec<NodeView> {
    nodes.into_iter().map(NodeView::from).collect()
}
