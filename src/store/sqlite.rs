//! SQLite implementation of the node store, via sqlx.
//!
//! All SQL lives here. Sort fields are interpolated from the compile-time
//! whitelist only; every user-supplied value travels as a bind parameter.

use crate::error::{FsError, Result};
use crate::store::{NewNode, Node, NodeStore, NodeUpdate, SearchQuery};
use crate::types::{NodeId, NodeType, SearchScope, SortDirection, SortKey, TrashSortKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

const NODE_COLUMNS: &str = "id, name, node_type, parent_id, content, permissions, size, \
                            created_at, modified_at, is_trashed, trashed_at";

/// SQLite-backed node store.
pub struct SqliteNodeStore {
    pool: SqlitePool,
}

impl SqliteNodeStore {
    /// Connect with the default pool size and apply the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, 5).await
    }

    /// Connect to `url` (e.g. `sqlite:arbor.db` or `sqlite::memory:`),
    /// creating the database file if missing, and apply the schema.
    ///
    /// In-memory databases get a single pooled connection that is never
    /// recycled; dropping it would drop the database.
    pub async fn connect_with(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(FsError::Store)?
            .create_if_missing(true)
            .foreign_keys(true);

        let is_memory = url.contains(":memory:");
        let pool = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Fresh private in-memory store.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Apply the embedded schema, one statement at a time (sqlx does not
    /// execute multi-statement strings).
    async fn migrate(&self) -> Result<()> {
        let schema = include_str!("../../migrations/sqlite.sql");
        for statement in schema.split(';') {
            let statement: String = statement
                .lines()
                .filter(|line| {
                    let trimmed = line.trim();
                    !trimmed.is_empty() && !trimmed.starts_with("--")
                })
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// A unique-index hit on write means a racing sibling won; everything else
/// is passed through as an opaque store failure.
fn map_write_err(err: sqlx::Error) -> FsError {
    match err {
        sqlx::Error::RowNotFound => FsError::NotFound,
        sqlx::Error::Database(db) => {
            if matches!(db.kind(), ErrorKind::UniqueViolation) {
                FsError::Conflict
            } else {
                FsError::Store(sqlx::Error::Database(db))
            }
        }
        other => FsError::Store(other),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn content_size(content: Option<&str>) -> i64 {
    content.map(|c| c.chars().count() as i64).unwrap_or(0)
}

/// `%needle%` with LIKE wildcards escaped, lowercased for the LOWER() match.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
    async fn insert(&self, new: NewNode) -> Result<Node> {
        let now = Utc::now();
        let size = match new.node_type {
            NodeType::File => content_size(new.content.as_deref()),
            NodeType::Directory => 0,
        };
        let sql = format!(
            "INSERT INTO nodes (name, node_type, parent_id, content, permissions, size, \
             created_at, modified_at, is_trashed, trashed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, NULL) \
             RETURNING {NODE_COLUMNS}"
        );
        let node = sqlx::query_as::<_, Node>(&sql)
            .bind(&new.name)
            .bind(new.node_type)
            .bind(new.parent_id)
            .bind(&new.content)
            .bind(new.permissions)
            .bind(size)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_err)?;
        debug!(node = node.id, name = %node.name, "inserted node");
        Ok(node)
    }

    async fn get(&self, id: NodeId) -> Result<Option<Node>> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1");
        let node = sqlx::query_as::<_, Node>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(node)
    }

    async fn update(&self, id: NodeId, changes: NodeUpdate) -> Result<Node> {
        let current = self.get(id).await?.ok_or(FsError::NotFound)?;

        let name = changes.name.unwrap_or(current.name);
        let parent_id = match changes.parent_id {
            Some(parent) => parent,
            None => current.parent_id,
        };
        let (content, size) = match changes.content {
            Some(text) => {
                let size = content_size(Some(&text));
                (Some(text), size)
            }
            None => (current.content, current.size),
        };
        let permissions = changes.permissions.unwrap_or(current.permissions);

        let sql = format!(
            "UPDATE nodes SET name = ?2, parent_id = ?3, content = ?4, permissions = ?5, \
             size = ?6, modified_at = ?7 WHERE id = ?1 RETURNING {NODE_COLUMNS}"
        );
        sqlx::query_as::<_, Node>(&sql)
            .bind(id)
            .bind(&name)
            .bind(parent_id)
            .bind(&content)
            .bind(permissions)
            .bind(size)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_err)
    }

    async fn list_children(
        &self,
        parent: Option<NodeId>,
        sort: SortKey,
        direction: SortDirection,
    ) -> Result<Vec<Node>> {
        let order = format!("ORDER BY {} {}, id ASC", sort.column(), direction.keyword());
        let rows = match parent {
            Some(parent_id) => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE is_trashed = 0 AND parent_id = ?1 {order}"
                );
                sqlx::query_as::<_, Node>(&sql)
                    .bind(parent_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM nodes \
                     WHERE is_trashed = 0 AND parent_id IS NULL {order}"
                );
                sqlx::query_as::<_, Node>(&sql).fetch_all(&self.pool).await?
            }
        };
        Ok(rows)
    }

    async fn children_of_any(&self, parents: &[NodeId]) -> Result<Vec<Node>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id IN ({}) ORDER BY id ASC",
            placeholders(parents.len())
        );
        let mut query = sqlx::query_as::<_, Node>(&sql);
        for id in parents {
            query = query.bind(*id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn live_sibling_exists(
        &self,
        parent: Option<NodeId>,
        name: &str,
        node_type: NodeType,
        exclude: Option<NodeId>,
    ) -> Result<bool> {
        let parent_clause = if parent.is_some() {
            "parent_id = ?"
        } else {
            "parent_id IS NULL"
        };
        let exclude_clause = if exclude.is_some() { " AND id != ?" } else { "" };
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM nodes \
             WHERE is_trashed = 0 AND node_type = ? AND name = ? AND {parent_clause}{exclude_clause})"
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(node_type).bind(name);
        if let Some(parent_id) = parent {
            query = query.bind(parent_id);
        }
        if let Some(excluded) = exclude {
            query = query.bind(excluded);
        }
        Ok(query.fetch_one(&self.pool).await? != 0)
    }

    async fn set_trash_state(
        &self,
        ids: &[NodeId],
        trashed_at: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE nodes SET is_trashed = ?, trashed_at = ?, modified_at = ? WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(trashed_at.is_some())
            .bind(trashed_at)
            .bind(Utc::now());
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn restore_subtree(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        descendants: &[NodeId],
    ) -> Result<Node> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE nodes SET parent_id = ?2, is_trashed = 0, trashed_at = NULL, \
             modified_at = ?3 WHERE id = ?1 RETURNING {NODE_COLUMNS}"
        );
        let node = sqlx::query_as::<_, Node>(&sql)
            .bind(id)
            .bind(parent)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_err)?;

        if !descendants.is_empty() {
            let sql = format!(
                "UPDATE nodes SET is_trashed = 0, trashed_at = NULL, modified_at = ? \
                 WHERE is_trashed = 1 AND id IN ({})",
                placeholders(descendants.len())
            );
            let mut query = sqlx::query(&sql).bind(now);
            for id in descendants {
                query = query.bind(*id);
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(node)
    }

    async fn delete_rows(&self, ids: &[NodeId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM nodes WHERE id IN ({})", placeholders(ids.len()));
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn list_trashed(
        &self,
        sort: TrashSortKey,
        direction: SortDirection,
    ) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE is_trashed = 1 \
             ORDER BY {} {}, id ASC",
            sort.column(),
            direction.keyword()
        );
        Ok(sqlx::query_as::<_, Node>(&sql).fetch_all(&self.pool).await?)
    }

    async fn list_directories(&self) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes \
             WHERE is_trashed = 0 AND node_type = 'DIRECTORY' ORDER BY name ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, Node>(&sql).fetch_all(&self.pool).await?)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Node>> {
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE 1 = 1");
        if !query.include_trash {
            sql.push_str(" AND is_trashed = 0");
        }
        match query.scope {
            SearchScope::Name => sql.push_str(" AND LOWER(name) LIKE ? ESCAPE '\\'"),
            SearchScope::Content => sql.push_str(
                " AND node_type = 'FILE' AND content IS NOT NULL \
                 AND LOWER(content) LIKE ? ESCAPE '\\'",
            ),
            SearchScope::Both => sql.push_str(
                " AND (LOWER(name) LIKE ? ESCAPE '\\' \
                 OR (node_type = 'FILE' AND content IS NOT NULL \
                 AND LOWER(content) LIKE ? ESCAPE '\\'))",
            ),
        }
        if query.node_type.is_some() {
            sql.push_str(" AND node_type = ?");
        }
        match query.parent_id {
            Some(Some(_)) => sql.push_str(" AND parent_id = ?"),
            Some(None) => sql.push_str(" AND parent_id IS NULL"),
            None => {}
        }
        sql.push_str(&format!(
            " ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            query.sort.column(),
            query.direction.keyword()
        ));

        let pattern = like_pattern(&query.needle);
        let mut q = sqlx::query_as::<_, Node>(&sql).bind(pattern.clone());
        if query.scope == SearchScope::Both {
            q = q.bind(pattern);
        }
        if let Some(node_type) = query.node_type {
            q = q.bind(node_type);
        }
        if let Some(Some(parent_id)) = query.parent_id {
            q = q.bind(parent_id);
        }
        q = q.bind(query.limit).bind(query.offset);
        Ok(q.fetch_all(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perms::DEFAULT_MASK;

    fn new_dir(name: &str, parent: Option<NodeId>) -> NewNode {
        NewNode {
            name: name.to_string(),
            node_type: NodeType::Directory,
            parent_id: parent,
            content: None,
            permissions: DEFAULT_MASK,
        }
    }

    fn new_file(name: &str, parent: Option<NodeId>, content: &str) -> NewNode {
        NewNode {
            name: name.to_string(),
            node_type: NodeType::File,
            parent_id: parent,
            content: Some(content.to_string()),
            permissions: DEFAULT_MASK,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        let dir = store.insert(new_dir("docs", None)).await.unwrap();
        assert_eq!(dir.node_type, NodeType::Directory);
        assert_eq!(dir.size, 0);
        assert!(!dir.is_trashed);

        let file = store.insert(new_file("a.txt", Some(dir.id), "hello")).await.unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(file.parent_id, Some(dir.id));

        let fetched = store.get(file.id).await.unwrap().unwrap();
        assert_eq!(fetched.content.as_deref(), Some("hello"));
        assert!(store.get(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_index_rejects_racing_duplicate() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        store.insert(new_dir("docs", None)).await.unwrap();
        let err = store.insert(new_dir("docs", None)).await.unwrap_err();
        assert!(matches!(err, FsError::Conflict));

        // Same name is fine once the first is trashed.
        let first = store
            .live_sibling_exists(None, "docs", NodeType::Directory, None)
            .await
            .unwrap();
        assert!(first);
    }

    #[tokio::test]
    async fn test_unique_index_covers_root_level() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        store.insert(new_file("a.txt", None, "x")).await.unwrap();
        let err = store.insert(new_file("a.txt", None, "y")).await.unwrap_err();
        assert!(matches!(err, FsError::Conflict));
    }

    #[tokio::test]
    async fn test_update_refreshes_size_and_modified_at() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        let file = store.insert(new_file("a.txt", None, "hello")).await.unwrap();
        let updated = store
            .update(
                file.id,
                NodeUpdate {
                    content: Some("hello world".to_string()),
                    ..NodeUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.size, 11);
        assert!(updated.modified_at >= file.modified_at);
        assert_eq!(updated.created_at, file.created_at);
    }

    #[tokio::test]
    async fn test_children_of_any_ignores_trash_state() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        let root = store.insert(new_dir("root", None)).await.unwrap();
        let a = store.insert(new_file("a", Some(root.id), "1")).await.unwrap();
        let b = store.insert(new_file("b", Some(root.id), "2")).await.unwrap();
        store.set_trash_state(&[a.id], Some(Utc::now())).await.unwrap();

        let children = store.children_of_any(&[root.id]).await.unwrap();
        let ids: Vec<NodeId> = children.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        assert!(store.children_of_any(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_trash_state_batch() {
        let store = SqliteNodeStore::in_memory().await.unwrap();
        let a = store.insert(new_file("a", None, "1")).await.unwrap();
        let b = store.insert(new_file("b", None, "2")).await.unwrap();

        let changed = store
            .set_trash_state(&[a.id, b.id], Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert!(store.get(a.id).await.unwrap().unwrap().is_trashed);
        assert!(store.get(b.id).await.unwrap().unwrap().trashed_at.is_some());

        store.set_trash_state(&[a.id], None).await.unwrap();
        let restored = store.get(a.id).await.unwrap().unwrap();
        assert!(!restored.is_trashed);
        assert!(restored.trashed_at.is_none());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("MiXeD"), "%mixed%");
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("arbor.db").display());

        let store = SqliteNodeStore::connect(&url).await.unwrap();
        let node = store.insert(new_dir("persisted", None)).await.unwrap();
        drop(store);

        let reopened = SqliteNodeStore::connect(&url).await.unwrap();
        let fetched = reopened.get(node.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "persisted");
    }
}
