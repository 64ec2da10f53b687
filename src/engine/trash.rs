//! Cascade operations: trash, restore, purge.
//!
//! Trash and purge act on whole subtrees; restore re-attaches one root and
//! un-trashes its descendants in place. Permission and trash-state checks
//! run over the full member set before the single batch write, collecting
//! every violator so a failed cascade reports the complete picture.

use super::TreeEngine;
use crate::error::{FsError, Result};
use crate::perms::{self, Permission};
use crate::store::Node;
use crate::types::{NodeId, NodeType, SortDirection, TrashSortKey};
use crate::walker::collect_subtree;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// How many rows a trash cascade marked.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrashOutcome {
    pub trashed_count: u64,
}

/// How many rows a purge removed permanently.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PurgeOutcome {
    pub purged_count: u64,
}

/// Where a restored node re-attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreDest {
    /// Back under the parent recorded on the row.
    #[default]
    OriginalParent,
    /// Detach to root level.
    Root,
    /// Under an explicit live directory.
    Parent(NodeId),
}

impl TreeEngine {
    /// Soft-delete a directory and its entire subtree. Requires DELETE on
    /// the directory and on every descendant; the whole operation fails
    /// with the full violator list otherwise, and nothing is written.
    pub async fn trash_directory(&self, id: NodeId) -> Result<TrashOutcome> {
        let node = self.require_live(id, NodeType::Directory).await?;
        perms::require(&node, Permission::Delete)?;

        let members = collect_subtree(self.store(), &node).await?;
        require_delete_on_descendants(&members)?;

        let ids: Vec<NodeId> = members.iter().map(|n| n.id).collect();
        self.store().set_trash_state(&ids, Some(Utc::now())).await?;
        info!(node = id, count = ids.len(), "trashed subtree");
        Ok(TrashOutcome {
            trashed_count: ids.len() as u64,
        })
    }

    /// Soft-delete one file.
    pub async fn trash_file(&self, id: NodeId) -> Result<TrashOutcome> {
        let node = self.require_live(id, NodeType::File).await?;
        perms::require(&node, Permission::Delete)?;
        self.store()
            .set_trash_state(&[id], Some(Utc::now()))
            .await?;
        info!(node = id, "trashed file");
        Ok(TrashOutcome { trashed_count: 1 })
    }

    /// Bring a trashed node back. The destination must resolve to a live
    /// directory (or root level); restoring a directory un-trashes all of
    /// its descendants without touching their parent links.
    pub async fn restore(&self, id: NodeId, dest: RestoreDest) -> Result<Node> {
        let node = self.store().get(id).await?.ok_or(FsError::NotFound)?;
        if !node.is_trashed {
            return Err(FsError::BadRequest("node is not in the trash".to_string()));
        }

        let target_parent = match dest {
            RestoreDest::Root => None,
            RestoreDest::OriginalParent => {
                if let Some(original) = node.parent_id {
                    self.require_live_directory(original).await?;
                }
                node.parent_id
            }
            RestoreDest::Parent(parent_id) => {
                let parent = self.require_live_directory(parent_id).await?;
                perms::require(&parent, Permission::Write)?;
                Some(parent_id)
            }
        };

        if self
            .store()
            .live_sibling_exists(target_parent, &node.name, node.node_type, Some(id))
            .await?
        {
            return Err(FsError::Conflict);
        }

        let descendants: Vec<NodeId> = if node.node_type == NodeType::Directory {
            collect_subtree(self.store(), &node)
                .await?
                .into_iter()
                .skip(1)
                .map(|n| n.id)
                .collect()
        } else {
            Vec::new()
        };

        let restored = self
            .store()
            .restore_subtree(id, target_parent, &descendants)
            .await?;
        info!(node = id, descendants = descendants.len(), "restored");
        Ok(restored)
    }

    /// Permanently remove a trashed subtree. Every member must already be
    /// trashed (purge never silently deletes live data) and carry DELETE.
    pub async fn purge(&self, id: NodeId) -> Result<PurgeOutcome> {
        let node = self.store().get(id).await?.ok_or(FsError::NotFound)?;
        if !node.is_trashed {
            return Err(FsError::BadRequest("node is not in the trash".to_string()));
        }

        let members = collect_subtree(self.store(), &node).await?;
        let live_ids: Vec<NodeId> = members
            .iter()
            .filter(|n| !n.is_trashed)
            .map(|n| n.id)
            .collect();
        if !live_ids.is_empty() {
            return Err(FsError::IncompleteTrash { live_ids });
        }

        perms::require(&node, Permission::Delete)?;
        require_delete_on_descendants(&members)?;

        let ids: Vec<NodeId> = members.iter().map(|n| n.id).collect();
        self.store().delete_rows(&ids).await?;
        info!(node = id, count = ids.len(), "purged subtree");
        Ok(PurgeOutcome {
            purged_count: ids.len() as u64,
        })
    }

    /// Single-node purge of a trashed file.
    pub async fn purge_file(&self, id: NodeId) -> Result<PurgeOutcome> {
        let node = self.store().get(id).await?.ok_or(FsError::NotFound)?;
        if node.node_type != NodeType::File {
            return Err(FsError::NotFound);
        }
        if !node.is_trashed {
            return Err(FsError::BadRequest("node is not in the trash".to_string()));
        }
        perms::require(&node, Permission::Delete)?;

        self.store().delete_rows(&[id]).await?;
        info!(node = id, "purged file");
        Ok(PurgeOutcome { purged_count: 1 })
    }

    /// Every trashed node, ordered by the trash sort whitelist.
    pub async fn list_trash(
        &self,
        sort: TrashSortKey,
        direction: SortDirection,
    ) -> Result<Vec<Node>> {
        self.store().list_trashed(sort, direction).await
    }

    async fn require_live_directory(&self, id: NodeId) -> Result<Node> {
        match self.store().get(id).await? {
            Some(node) if !node.is_trashed && node.node_type == NodeType::Directory => Ok(node),
            _ => Err(FsError::InvalidParent),
        }
    }
}

/// DELETE must hold on every member below the root; all violators are
/// collected before the cascade is allowed to write.
fn require_delete_on_descendants(members: &[Node]) -> Result<()> {
    let offending_ids: Vec<NodeId> = members
        .iter()
        .skip(1)
        .filter(|n| n.permissions & Permission::Delete.bit() == 0)
        .map(|n| n.id)
        .collect();
    if !offending_ids.is_empty() {
        return Err(FsError::PartialPermission { offending_ids });
    }
    Ok(())
}
