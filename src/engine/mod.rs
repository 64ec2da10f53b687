//! Tree Mutation Engine
//!
//! Orchestrates create, rename/move, trash, restore, and purge as atomic,
//! permission-checked operations against the node store. Every operation
//! validates fully before its first write; on any violated precondition the
//! store is left untouched. Cascade operations live in `trash`.

mod trash;

pub use trash::{PurgeOutcome, RestoreDest, TrashOutcome};

use crate::error::{FsError, Result};
use crate::perms::{self, Permission, DEFAULT_MASK};
use crate::store::{NewNode, Node, NodeStore, NodeUpdate};
use crate::types::{NodeId, NodeType, SortDirection, SortKey};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Longest accepted node name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Requested rename/move/content change. `None` fields are left untouched;
/// an all-`None` request is a no-op that returns the current state.
#[derive(Debug, Clone, Default)]
pub struct RenameMove {
    pub name: Option<String>,
    /// Outer None = keep current parent; Some(None) = move to root level.
    pub parent_id: Option<Option<NodeId>>,
    /// New text payload, FILE nodes only.
    pub content: Option<String>,
}

impl RenameMove {
    fn is_noop(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none() && self.content.is_none()
    }
}

/// The structural-integrity core: all tree mutations go through here.
pub struct TreeEngine {
    store: Arc<dyn NodeStore>,
    default_permissions: i64,
}

impl TreeEngine {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_default_permissions(store, DEFAULT_MASK)
    }

    /// Engine whose newly created nodes default to `mask` when the caller
    /// does not pass permissions.
    pub fn with_default_permissions(store: Arc<dyn NodeStore>, mask: i64) -> Self {
        Self {
            store,
            default_permissions: mask,
        }
    }

    pub(crate) fn store(&self) -> &dyn NodeStore {
        self.store.as_ref()
    }

    /// Create a DIRECTORY node. The parent, when given, must be a live
    /// directory carrying WRITE.
    pub async fn create_directory(
        &self,
        name: &str,
        parent_id: Option<NodeId>,
        permissions: Option<i64>,
    ) -> Result<Node> {
        self.create_node(NodeType::Directory, name, parent_id, None, permissions)
            .await
    }

    /// Create a FILE node; `size` is derived from the content length.
    pub async fn create_file(
        &self,
        name: &str,
        parent_id: Option<NodeId>,
        content: Option<String>,
        permissions: Option<i64>,
    ) -> Result<Node> {
        self.create_node(NodeType::File, name, parent_id, content, permissions)
            .await
    }

    async fn create_node(
        &self,
        node_type: NodeType,
        name: &str,
        parent_id: Option<NodeId>,
        content: Option<String>,
        permissions: Option<i64>,
    ) -> Result<Node> {
        validate_name(name)?;

        if let Some(parent_id) = parent_id {
            let parent = self.require_parent_directory(parent_id).await?;
            perms::require(&parent, Permission::Write)?;
        }

        let permissions = permissions.unwrap_or(self.default_permissions);
        if !perms::valid_mask(permissions) {
            return Err(FsError::BadRequest(format!(
                "permissions mask {} outside [0, 15]",
                permissions
            )));
        }

        if self
            .store
            .live_sibling_exists(parent_id, name, node_type, None)
            .await?
        {
            return Err(FsError::DuplicateName);
        }

        let node = self
            .store
            .insert(NewNode {
                name: name.to_string(),
                node_type,
                parent_id,
                content,
                permissions,
            })
            .await?;
        info!(node = node.id, name = %node.name, kind = node.node_type.as_str(), "created");
        Ok(node)
    }

    /// Rename and/or move one node, with an optional content edit for FILE
    /// nodes. Requires WRITE on the node, and WRITE on the destination
    /// directory when moving. Moving a directory into its own subtree fails
    /// with `CycleDetected` before anything is written.
    pub async fn rename_or_move(
        &self,
        id: NodeId,
        expected_type: NodeType,
        change: RenameMove,
    ) -> Result<Node> {
        let node = self.require_live(id, expected_type).await?;
        perms::require(&node, Permission::Write)?;

        if change.is_noop() {
            return Ok(node);
        }

        if let Some(name) = &change.name {
            validate_name(name)?;
        }
        if change.content.is_some() && expected_type == NodeType::Directory {
            return Err(FsError::BadRequest(
                "directories have no content".to_string(),
            ));
        }

        if let Some(Some(new_parent)) = change.parent_id {
            let parent = self.require_parent_directory(new_parent).await?;
            perms::require(&parent, Permission::Write)?;
            self.ensure_no_cycle(id, new_parent).await?;
        }

        // Collision is judged at the effective destination: the new name (or
        // the current one) under the new parent (or the current one).
        let effective_name = change.name.as_deref().unwrap_or(&node.name);
        let effective_parent = match change.parent_id {
            Some(parent) => parent,
            None => node.parent_id,
        };
        if self
            .store
            .live_sibling_exists(effective_parent, effective_name, node.node_type, Some(id))
            .await?
        {
            return Err(FsError::Conflict);
        }

        let updated = self
            .store
            .update(
                id,
                NodeUpdate {
                    name: change.name,
                    parent_id: change.parent_id,
                    content: change.content,
                    permissions: None,
                },
            )
            .await?;
        info!(node = id, name = %updated.name, "renamed/moved");
        Ok(updated)
    }

    /// Live direct children of `parent` (root level when None), ordered by
    /// the whitelisted sort field.
    pub async fn list_children(
        &self,
        parent: Option<NodeId>,
        sort: SortKey,
        direction: SortDirection,
    ) -> Result<Vec<Node>> {
        if let Some(parent_id) = parent {
            self.require_parent_directory(parent_id).await?;
        }
        self.store.list_children(parent, sort, direction).await
    }

    /// Fetch one live FILE node, READ-checked.
    pub async fn get_file(&self, id: NodeId) -> Result<Node> {
        let node = self.require_live(id, NodeType::File).await?;
        perms::require(&node, Permission::Read)?;
        Ok(node)
    }

    /// Fetch one live DIRECTORY node, READ-checked.
    pub async fn get_directory(&self, id: NodeId) -> Result<Node> {
        let node = self.require_live(id, NodeType::Directory).await?;
        perms::require(&node, Permission::Read)?;
        Ok(node)
    }

    /// Every live directory, name-ordered. Feeds destination pickers.
    pub async fn list_directories(&self) -> Result<Vec<Node>> {
        self.store.list_directories().await
    }

    /// Fetch a node that must exist, be live, and match `expected_type`.
    pub(crate) async fn require_live(&self, id: NodeId, expected_type: NodeType) -> Result<Node> {
        match self.store.get(id).await? {
            Some(node) if !node.is_trashed && node.node_type == expected_type => Ok(node),
            _ => Err(FsError::NotFound),
        }
    }

    /// Resolve a parent reference to a live directory.
    async fn require_parent_directory(&self, id: NodeId) -> Result<Node> {
        match self.store.get(id).await? {
            Some(node) if !node.is_trashed && node.node_type == NodeType::Directory => Ok(node),
            _ => Err(FsError::InvalidParent),
        }
    }

    /// Walk up from the candidate parent to the root; the moved node showing
    /// up on that ancestor path means the move would close a cycle.
    async fn ensure_no_cycle(&self, moving: NodeId, candidate_parent: NodeId) -> Result<()> {
        if moving == candidate_parent {
            return Err(FsError::CycleDetected);
        }
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut cursor = Some(candidate_parent);
        while let Some(current) = cursor {
            if current == moving {
                return Err(FsError::CycleDetected);
            }
            if !seen.insert(current) {
                break;
            }
            cursor = match self.store.get(current).await? {
                Some(node) => node.parent_id,
                None => None,
            };
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FsError::BadRequest("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FsError::BadRequest(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}
