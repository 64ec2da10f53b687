//! Search Engine
//!
//! Permission-aware text search over node names and file content. The store
//! performs the substring match, ordering, and windowing; READ filtering
//! happens here. Candidate windows are fetched at a configurable multiple
//! of the requested limit and paged until the limit is reached or the
//! source is exhausted, so permission-dense trees cannot under-fill the
//! result set.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::perms::Permission;
use crate::store::{Node, NodeStore, SearchQuery};
use crate::types::{NodeId, NodeType, SearchScope, SortDirection, SortKey};
use std::sync::Arc;
use tracing::debug;

/// One search invocation.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub scope: SearchScope,
    pub include_trash: bool,
    pub node_type: Option<NodeType>,
    /// Outer None = anywhere; Some(None) = root level only.
    pub parent_id: Option<Option<NodeId>>,
    /// Defaults to the configured limit; always clamped to the cap.
    pub limit: Option<i64>,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Filtered, permission-aware search over the node store.
pub struct SearchEngine {
    store: Arc<dyn NodeStore>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    pub fn with_config(store: Arc<dyn NodeStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Case-insensitive substring search. An empty or whitespace-only query
    /// returns an empty result set without touching the store. Only nodes
    /// carrying READ are returned.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Node>> {
        let needle = request.query.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let limit = request
            .limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit);
        let window = limit.saturating_mul(self.config.window_multiplier.max(1));

        let mut visible: Vec<Node> = Vec::new();
        let mut offset = 0;
        loop {
            let batch = self
                .store
                .search(&SearchQuery {
                    needle: needle.to_string(),
                    scope: request.scope,
                    include_trash: request.include_trash,
                    node_type: request.node_type,
                    parent_id: request.parent_id,
                    sort: request.sort,
                    direction: request.direction,
                    limit: window,
                    offset,
                })
                .await?;
            let exhausted = (batch.len() as i64) < window;

            for node in batch {
                if node.permissions & Permission::Read.bit() != 0 {
                    visible.push(node);
                    if visible.len() as i64 == limit {
                        return Ok(visible);
                    }
                }
            }

            if exhausted {
                debug!(matches = visible.len(), "search exhausted source");
                return Ok(visible);
            }
            offset += window;
        }
    }
}
