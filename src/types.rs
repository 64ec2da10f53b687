//! Core identifier and enum types shared across the crate.

use serde::{Deserialize, Serialize};

/// NodeId: store-assigned row identifier
pub type NodeId = i64;

/// Node kind, immutable after creation. Stored as TEXT 'FILE'/'DIRECTORY'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    /// External token, matching the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "FILE",
            NodeType::Directory => "DIRECTORY",
        }
    }

    /// Parse an external token. Returns None for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FILE" => Some(NodeType::File),
            "DIRECTORY" => Some(NodeType::Directory),
            _ => None,
        }
    }
}

/// Sortable fields for child listings and search results.
///
/// The set of valid fields is a fixed whitelist; unrecognized keys fall back
/// to `Name` rather than reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Modified,
    Type,
}

impl SortKey {
    /// Map an external sort token onto the whitelist.
    pub fn parse(value: &str) -> Self {
        match value {
            "name" => SortKey::Name,
            "size" => SortKey::Size,
            "mtime" => SortKey::Modified,
            "type" => SortKey::Type,
            _ => SortKey::Name,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::Modified => "modified_at",
            SortKey::Type => "node_type",
        }
    }
}

/// Sortable fields for trash listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashSortKey {
    Name,
    Size,
    Type,
    #[default]
    TrashedAt,
}

impl TrashSortKey {
    pub fn parse(value: &str) -> Self {
        match value {
            "name" => TrashSortKey::Name,
            "size" => TrashSortKey::Size,
            "type" => TrashSortKey::Type,
            "trashed_at" => TrashSortKey::TrashedAt,
            _ => TrashSortKey::TrashedAt,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            TrashSortKey::Name => "name",
            TrashSortKey::Size => "size",
            TrashSortKey::Type => "node_type",
            TrashSortKey::TrashedAt => "trashed_at",
        }
    }
}

/// Sort direction for listings and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// "desc" sorts descending; every other token sorts ascending.
    pub fn parse(value: &str) -> Self {
        match value {
            "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Which node fields a text search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    Name,
    Content,
    #[default]
    Both,
}

impl SearchScope {
    pub fn parse(value: &str) -> Self {
        match value {
            "name" => SearchScope::Name,
            "content" => SearchScope::Content,
            _ => SearchScope::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_round_trip() {
        assert_eq!(NodeType::parse("FILE"), Some(NodeType::File));
        assert_eq!(NodeType::parse("DIRECTORY"), Some(NodeType::Directory));
        assert_eq!(NodeType::parse("file"), None);
        assert_eq!(NodeType::File.as_str(), "FILE");
        assert_eq!(NodeType::Directory.as_str(), "DIRECTORY");
    }

    #[test]
    fn test_sort_key_whitelist_fallback() {
        assert_eq!(SortKey::parse("size"), SortKey::Size);
        assert_eq!(SortKey::parse("mtime"), SortKey::Modified);
        assert_eq!(SortKey::parse("type"), SortKey::Type);
        // Injection-shaped input falls back to name.
        assert_eq!(SortKey::parse("name; DROP TABLE nodes"), SortKey::Name);
        assert_eq!(SortKey::parse(""), SortKey::Name);
    }

    #[test]
    fn test_trash_sort_key_fallback() {
        assert_eq!(TrashSortKey::parse("name"), TrashSortKey::Name);
        assert_eq!(TrashSortKey::parse("bogus"), TrashSortKey::TrashedAt);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse("asc"), SortDirection::Asc);
        assert_eq!(SortDirection::parse("sideways"), SortDirection::Asc);
    }

    #[test]
    fn test_search_scope_parse() {
        assert_eq!(SearchScope::parse("name"), SearchScope::Name);
        assert_eq!(SearchScope::parse("content"), SearchScope::Content);
        assert_eq!(SearchScope::parse("both"), SearchScope::Both);
        assert_eq!(SearchScope::parse("anything"), SearchScope::Both);
    }
}
