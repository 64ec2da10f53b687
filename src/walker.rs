//! Subtree Walker
//!
//! Breadth-first descendant collection over the adjacency list, used by the
//! cascade operations (trash, restore, purge). The walk expands a whole
//! frontier per store call, so the query count is bounded by tree depth
//! rather than node count. Iterative on purpose: deep trees must not grow
//! the call stack.

use crate::error::Result;
use crate::store::{Node, NodeStore};
use crate::types::NodeId;
use std::collections::HashSet;

/// Collect the root and every descendant, breadth-first, root first.
/// Trashed nodes are included; cascades need to see them.
pub async fn collect_subtree(store: &dyn NodeStore, root: &Node) -> Result<Vec<Node>> {
    let mut collected = vec![root.clone()];
    let mut seen: HashSet<NodeId> = HashSet::from([root.id]);
    let mut frontier = vec![root.id];

    while !frontier.is_empty() {
        let batch = store.children_of_any(&frontier).await?;
        frontier = Vec::with_capacity(batch.len());
        for node in batch {
            // Corrupt parent links must not loop the walk.
            if seen.insert(node.id) {
                frontier.push(node.id);
                collected.push(node);
            }
        }
    }

    Ok(collected)
}

/// Id-only variant for callers that do not hold the root node.
pub async fn collect_subtree_ids(store: &dyn NodeStore, root_id: NodeId) -> Result<Vec<NodeId>> {
    let root = match store.get(root_id).await? {
        Some(node) => node,
        None => return Ok(Vec::new()),
    };
    let nodes = collect_subtree(store, &root).await?;
    Ok(nodes.into_iter().map(|n| n.id).collect())
}
