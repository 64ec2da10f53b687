//! Error taxonomy for tree and permission operations.
//!
//! Every validation failure maps to one variant; operations return the first
//! violated precondition and perform zero writes. Cascading checks collect
//! all violating node ids before failing.

use crate::perms::Permission;
use crate::types::NodeId;
use thiserror::Error;

/// Result type for Arbor operations
pub type Result<T> = std::result::Result<T, FsError>;

/// Failure modes surfaced by the tree engine, search engine, and stores.
#[derive(Error, Debug)]
pub enum FsError {
    /// Node is missing, trashed when a live node was expected, or of the
    /// wrong type.
    #[error("node not found")]
    NotFound,

    /// Parent reference does not resolve to a live directory.
    #[error("parent must be a live directory")]
    InvalidParent,

    /// A live sibling with the same name and type already exists.
    #[error("a node with this name already exists here")]
    DuplicateName,

    /// Rename/move/restore destination collides with a live sibling.
    #[error("destination already holds a node with this name")]
    Conflict,

    /// Moving a directory into its own subtree.
    #[error("cannot move a node into its own subtree")]
    CycleDetected,

    /// The node's mask is missing the flag required for this operation.
    #[error("permission denied: {} required", required.flag())]
    PermissionDenied { required: Permission },

    /// A cascade found descendants lacking the required flag. All violators
    /// are reported in one pass.
    #[error("permission denied on {} node(s) in subtree", offending_ids.len())]
    PartialPermission { offending_ids: Vec<NodeId> },

    /// Purge attempted while part of the subtree is still live.
    #[error("{} node(s) in subtree are not trashed", live_ids.len())]
    IncompleteTrash { live_ids: Vec<NodeId> },

    /// Malformed input: empty name, out-of-range mask, empty edit, ...
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Permission flag token outside READ/WRITE/DELETE/ADMIN.
    #[error("unknown permission '{0}'; use READ, WRITE, DELETE, ADMIN")]
    UnknownFlag(String),

    /// Opaque infrastructure failure from the relational store, passed
    /// through unmodified.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Configuration loading or validation failure.
    #[error("config error: {0}")]
    Config(String),
}
