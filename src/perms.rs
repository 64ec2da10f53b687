//! Permission bitmask codec and the mask edit manager.
//!
//! Each node carries a 4-bit mask: bit 0 READ, bit 1 WRITE, bit 2 DELETE,
//! bit 3 ADMIN. The codec converts between masks and named flags; the
//! manager reads and edits a node's mask via absolute-set or add/remove
//! deltas.

use crate::error::{FsError, Result};
use crate::store::{Node, NodeStore, NodeUpdate};
use crate::types::NodeId;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Full mask: all four flags set.
pub const FULL_MASK: i64 = 0b1111;

/// Default mask for new nodes: READ | WRITE | DELETE.
pub const DEFAULT_MASK: i64 = 0b0111;

/// One capability flag in a node's permission mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read = 1 << 0,
    Write = 1 << 1,
    Delete = 1 << 2,
    Admin = 1 << 3,
}

impl Permission {
    /// All flags, in bit order.
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::Admin,
    ];

    pub fn bit(self) -> i64 {
        self as i64
    }

    /// External flag token.
    pub fn flag(self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::Delete => "DELETE",
            Permission::Admin => "ADMIN",
        }
    }

    /// Parse an external flag token. Tokens are case-sensitive.
    pub fn from_flag(name: &str) -> Option<Self> {
        match name {
            "READ" => Some(Permission::Read),
            "WRITE" => Some(Permission::Write),
            "DELETE" => Some(Permission::Delete),
            "ADMIN" => Some(Permission::Admin),
            _ => None,
        }
    }
}

/// Flag names whose bit is set in `mask`, in bit order.
pub fn decode_mask(mask: i64) -> Vec<&'static str> {
    Permission::ALL
        .iter()
        .filter(|p| mask & p.bit() != 0)
        .map(|p| p.flag())
        .collect()
}

/// OR together the bits of the named flags.
pub fn encode_flags<S: AsRef<str>>(names: &[S]) -> Result<i64> {
    let mut bits = 0;
    for name in names {
        let flag = Permission::from_flag(name.as_ref())
            .ok_or_else(|| FsError::UnknownFlag(name.as_ref().to_string()))?;
        bits |= flag.bit();
    }
    Ok(bits)
}

/// Whether `mask` fits in the 4-bit range [0, 15].
pub fn valid_mask(mask: i64) -> bool {
    (0..=FULL_MASK).contains(&mask)
}

/// Fail with `PermissionDenied` unless the node's mask carries `required`.
pub fn require(node: &Node, required: Permission) -> Result<()> {
    if node.permissions & required.bit() == 0 {
        return Err(FsError::PermissionDenied { required });
    }
    Ok(())
}

/// A node's mask together with its decoded flag names.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionView {
    pub mask: i64,
    pub flags: Vec<&'static str>,
}

impl PermissionView {
    pub fn of(node: &Node) -> Self {
        Self {
            mask: node.permissions,
            flags: decode_mask(node.permissions),
        }
    }
}

/// Requested change to a node's mask. At least one field must be present.
#[derive(Debug, Clone, Default)]
pub struct PermissionEdit {
    /// Replace the whole mask before applying deltas.
    pub mask: Option<i64>,
    /// Flag names to OR in.
    pub add: Option<Vec<String>>,
    /// Flag names to AND out.
    pub remove: Option<Vec<String>>,
}

impl PermissionEdit {
    fn is_empty(&self) -> bool {
        self.mask.is_none() && self.add.is_none() && self.remove.is_none()
    }
}

/// Reads and edits node permission masks.
pub struct PermissionManager {
    store: Arc<dyn NodeStore>,
}

impl PermissionManager {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Read-only introspection: the node only has to exist (trashed is fine).
    pub async fn get(&self, id: NodeId) -> Result<PermissionView> {
        let node = self.store.get(id).await?.ok_or(FsError::NotFound)?;
        Ok(PermissionView::of(&node))
    }

    /// Apply an edit: absolute mask first, then OR in `add`, then AND out
    /// `remove`. Requires ADMIN on the node.
    pub async fn set(&self, id: NodeId, edit: PermissionEdit) -> Result<PermissionView> {
        if edit.is_empty() {
            return Err(FsError::BadRequest(
                "provide at least one of mask, add, remove".to_string(),
            ));
        }

        let node = self.store.get(id).await?.ok_or(FsError::NotFound)?;
        require(&node, Permission::Admin)?;

        let mut mask = node.permissions;
        if let Some(absolute) = edit.mask {
            if !valid_mask(absolute) {
                return Err(FsError::BadRequest(format!(
                    "permissions mask {} outside [0, 15]",
                    absolute
                )));
            }
            mask = absolute;
        }
        if let Some(add) = &edit.add {
            mask |= encode_flags(add)?;
        }
        if let Some(remove) = &edit.remove {
            mask &= !encode_flags(remove)?;
        }

        debug!(node = id, old_mask = node.permissions, new_mask = mask, "permission edit");
        let updated = self
            .store
            .update(
                id,
                NodeUpdate {
                    permissions: Some(mask),
                    ..NodeUpdate::default()
                },
            )
            .await?;
        Ok(PermissionView::of(&updated))
    }
}
