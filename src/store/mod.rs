//! Node Store
//!
//! Persistence port for the node tree. The engine depends on the `NodeStore`
//! trait only; `sqlite` provides the relational implementation. Every method
//! that writes does so in one statement or one short transaction so callers
//! observe an all-or-nothing effect.

pub mod sqlite;

pub use sqlite::SqliteNodeStore;

use crate::error::Result;
use crate::types::{NodeId, NodeType, SearchScope, SortDirection, SortKey, TrashSortKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the node tree.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    /// Back-reference forming the adjacency list; None = root level.
    pub parent_id: Option<NodeId>,
    /// Text payload, FILE nodes only.
    pub content: Option<String>,
    /// 4-bit capability mask, always in [0, 15].
    pub permissions: i64,
    /// Character length of `content` for FILE nodes; 0 for DIRECTORY.
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub is_trashed: bool,
    pub trashed_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a node. The store assigns id and timestamps and
/// derives `size` from the content.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub node_type: NodeType,
    pub parent_id: Option<NodeId>,
    pub content: Option<String>,
    pub permissions: i64,
}

/// Partial update. `None` leaves a field untouched; `modified_at` is always
/// refreshed and `size` recomputed when content changes.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    /// Outer None = keep; Some(None) = move to root level.
    pub parent_id: Option<Option<NodeId>>,
    pub content: Option<String>,
    pub permissions: Option<i64>,
}

/// Store-level search filter. The needle is already trimmed and non-empty;
/// permission filtering happens above the store.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub needle: String,
    pub scope: SearchScope,
    pub include_trash: bool,
    pub node_type: Option<NodeType>,
    /// Outer None = any parent; Some(None) = root level only.
    pub parent_id: Option<Option<NodeId>>,
    pub sort: SortKey,
    pub direction: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

/// Relational persistence port for node rows.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert one row. A racing duplicate insert is rejected by the store's
    /// live-sibling uniqueness constraint and surfaces as `Conflict`.
    async fn insert(&self, new: NewNode) -> Result<Node>;

    /// Fetch one row by id, trashed or not.
    async fn get(&self, id: NodeId) -> Result<Option<Node>>;

    /// Partial update of one row. `NotFound` if the row is gone.
    async fn update(&self, id: NodeId, changes: NodeUpdate) -> Result<Node>;

    /// Live (non-trashed) direct children of one parent, ordered by the
    /// whitelisted sort field.
    async fn list_children(
        &self,
        parent: Option<NodeId>,
        sort: SortKey,
        direction: SortDirection,
    ) -> Result<Vec<Node>>;

    /// All direct children of any listed parent, trashed or not. One call
    /// per tree level during frontier expansion.
    async fn children_of_any(&self, parents: &[NodeId]) -> Result<Vec<Node>>;

    /// Whether a live sibling with this (name, type) exists under `parent`,
    /// optionally excluding one id (the node being mutated).
    async fn live_sibling_exists(
        &self,
        parent: Option<NodeId>,
        name: &str,
        node_type: NodeType,
        exclude: Option<NodeId>,
    ) -> Result<bool>;

    /// Batch-set trash state on all listed rows in one statement.
    /// `Some(timestamp)` trashes; `None` clears the trash state.
    async fn set_trash_state(
        &self,
        ids: &[NodeId],
        trashed_at: Option<DateTime<Utc>>,
    ) -> Result<u64>;

    /// One transaction: un-trash the root and set its parent, then
    /// batch-clear the trash state of the listed descendants. Descendant
    /// parent links are untouched.
    async fn restore_subtree(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        descendants: &[NodeId],
    ) -> Result<Node>;

    /// Hard-delete all listed rows in one statement.
    async fn delete_rows(&self, ids: &[NodeId]) -> Result<u64>;

    /// Every trashed row, ordered by the trash sort whitelist.
    async fn list_trashed(&self, sort: TrashSortKey, direction: SortDirection)
        -> Result<Vec<Node>>;

    /// Every live directory, name-ordered. Feeds move/restore destination
    /// pickers.
    async fn list_directories(&self) -> Result<Vec<Node>>;

    /// Case-insensitive substring search over name and/or content with the
    /// query's filters, ordering, and window.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Node>>;
}
