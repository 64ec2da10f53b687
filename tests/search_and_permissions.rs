//! Integration tests for search and permission management.

use arbor::config::SearchConfig;
use arbor::engine::{RenameMove, TreeEngine};
use arbor::error::FsError;
use arbor::perms::{Permission, PermissionEdit, PermissionManager};
use arbor::search::{SearchEngine, SearchRequest};
use arbor::store::SqliteNodeStore;
use arbor::types::{NodeType, SearchScope, SortDirection, SortKey};
use std::sync::Arc;

async fn setup() -> (TreeEngine, SearchEngine, Arc<SqliteNodeStore>) {
    let store = Arc::new(SqliteNodeStore::in_memory().await.unwrap());
    (
        TreeEngine::new(store.clone()),
        SearchEngine::new(store.clone()),
        store,
    )
}

#[tokio::test]
async fn test_empty_query_returns_nothing() {
    let (engine, search, _) = setup().await;
    engine.create_file("match", None, None, None).await.unwrap();

    assert!(search.search(&SearchRequest::new("")).await.unwrap().is_empty());
    assert!(search
        .search(&SearchRequest::new("   "))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_name_match_is_case_insensitive_substring() {
    let (engine, search, _) = setup().await;
    engine
        .create_file("Quarterly-Report.txt", None, None, None)
        .await
        .unwrap();
    engine.create_file("notes.txt", None, None, None).await.unwrap();

    let hits = search
        .search(&SearchRequest {
            scope: SearchScope::Name,
            ..SearchRequest::new("rEpOrT")
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Quarterly-Report.txt");
}

#[tokio::test]
async fn test_content_scope_matches_files_only() {
    let (engine, search, _) = setup().await;
    engine
        .create_directory("report", None, None)
        .await
        .unwrap();
    engine
        .create_file("data.txt", None, Some("the report body".to_string()), None)
        .await
        .unwrap();

    let content_hits = search
        .search(&SearchRequest {
            scope: SearchScope::Content,
            ..SearchRequest::new("report")
        })
        .await
        .unwrap();
    assert_eq!(content_hits.len(), 1);
    assert_eq!(content_hits[0].name, "data.txt");

    // Both-scope unions name and content matches.
    let both_hits = search
        .search(&SearchRequest::new("report"))
        .await
        .unwrap();
    assert_eq!(both_hits.len(), 2);
}

#[tokio::test]
async fn test_like_wildcards_are_literal() {
    let (engine, search, _) = setup().await;
    engine
        .create_file("discount 50% off.txt", None, None, None)
        .await
        .unwrap();
    engine.create_file("500.txt", None, None, None).await.unwrap();

    let hits = search
        .search(&SearchRequest {
            scope: SearchScope::Name,
            ..SearchRequest::new("50%")
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "discount 50% off.txt");
}

#[tokio::test]
async fn test_trash_filter() {
    let (engine, search, _) = setup().await;
    let gone = engine
        .create_file("match-trashed", None, None, None)
        .await
        .unwrap();
    engine.create_file("match-live", None, None, None).await.unwrap();
    engine.trash_file(gone.id).await.unwrap();

    let live_only = search.search(&SearchRequest::new("match")).await.unwrap();
    assert_eq!(live_only.len(), 1);
    assert_eq!(live_only[0].name, "match-live");

    let with_trash = search
        .search(&SearchRequest {
            include_trash: true,
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(with_trash.len(), 2);
}

#[tokio::test]
async fn test_type_and_parent_filters() {
    let (engine, search, _) = setup().await;
    let dir = engine.create_directory("box", None, None).await.unwrap();
    engine
        .create_file("match-inside", Some(dir.id), None, None)
        .await
        .unwrap();
    engine
        .create_file("match-outside", None, None, None)
        .await
        .unwrap();
    engine
        .create_directory("match-dir", None, None)
        .await
        .unwrap();

    let files_only = search
        .search(&SearchRequest {
            node_type: Some(NodeType::File),
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(files_only.len(), 2);
    assert!(files_only.iter().all(|n| n.node_type == NodeType::File));

    let under_dir = search
        .search(&SearchRequest {
            parent_id: Some(Some(dir.id)),
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(under_dir.len(), 1);
    assert_eq!(under_dir[0].name, "match-inside");

    let root_only = search
        .search(&SearchRequest {
            parent_id: Some(None),
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(root_only.len(), 2);
    assert!(root_only.iter().all(|n| n.parent_id.is_none()));
}

#[tokio::test]
async fn test_read_denied_nodes_are_filtered_out() {
    let (engine, search, _) = setup().await;

    // WRITE | DELETE but no READ.
    engine
        .create_file("match-hidden", None, None, Some(6))
        .await
        .unwrap();
    engine
        .create_file("match-visible", None, None, None)
        .await
        .unwrap();

    let hits = search.search(&SearchRequest::new("match")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "match-visible");
}

#[tokio::test]
async fn test_permission_filter_pages_past_denied_windows() {
    let (engine, _, store) = setup().await;

    // Ten READ-denied rows sort ahead of the single visible one, so the
    // first 2x window holds no visible row at all.
    for i in 0..10 {
        engine
            .create_file(&format!("match-a{:02}", i), None, None, Some(6))
            .await
            .unwrap();
    }
    engine
        .create_file("match-z", None, None, None)
        .await
        .unwrap();

    let search = SearchEngine::new(store.clone());
    let hits = search
        .search(&SearchRequest {
            scope: SearchScope::Name,
            sort: SortKey::Name,
            direction: SortDirection::Asc,
            limit: Some(1),
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "match-z");
}

#[tokio::test]
async fn test_limit_is_clamped() {
    let (engine, _, store) = setup().await;
    for i in 0..5 {
        engine
            .create_file(&format!("match-{}", i), None, None, None)
            .await
            .unwrap();
    }

    let search = SearchEngine::with_config(
        store.clone(),
        SearchConfig {
            default_limit: 2,
            max_limit: 3,
            window_multiplier: 2,
        },
    );

    let defaulted = search.search(&SearchRequest::new("match")).await.unwrap();
    assert_eq!(defaulted.len(), 2);

    let capped = search
        .search(&SearchRequest {
            limit: Some(100),
            ..SearchRequest::new("match")
        })
        .await
        .unwrap();
    assert_eq!(capped.len(), 3);
}

#[tokio::test]
async fn test_get_permissions_decodes_mask() {
    let (engine, _, store) = setup().await;
    let node = engine
        .create_file("f.txt", None, None, Some(5))
        .await
        .unwrap();

    let manager = PermissionManager::new(store.clone());
    let view = manager.get(node.id).await.unwrap();
    assert_eq!(view.mask, 5);
    assert_eq!(view.flags, vec!["READ", "DELETE"]);

    assert!(matches!(
        manager.get(9999).await.unwrap_err(),
        FsError::NotFound
    ));
}

#[tokio::test]
async fn test_set_permissions_applies_mask_then_deltas() {
    let (engine, _, store) = setup().await;
    let node = engine
        .create_file("f.txt", None, None, Some(15))
        .await
        .unwrap();
    let manager = PermissionManager::new(store.clone());

    // Absolute mask first, then OR add, then AND-NOT remove.
    let view = manager
        .set(
            node.id,
            PermissionEdit {
                mask: Some(1),
                add: Some(vec!["WRITE".to_string(), "ADMIN".to_string()]),
                remove: Some(vec!["WRITE".to_string()]),
            },
        )
        .await
        .unwrap();
    assert_eq!(view.mask, 9);
    assert_eq!(view.flags, vec!["READ", "ADMIN"]);
}

#[tokio::test]
async fn test_set_permissions_validation() {
    let (engine, _, store) = setup().await;
    let node = engine
        .create_file("f.txt", None, None, Some(15))
        .await
        .unwrap();
    let manager = PermissionManager::new(store.clone());

    assert!(matches!(
        manager.set(node.id, PermissionEdit::default()).await.unwrap_err(),
        FsError::BadRequest(_)
    ));
    assert!(matches!(
        manager
            .set(
                node.id,
                PermissionEdit {
                    mask: Some(99),
                    ..PermissionEdit::default()
                }
            )
            .await
            .unwrap_err(),
        FsError::BadRequest(_)
    ));
    assert!(matches!(
        manager
            .set(
                node.id,
                PermissionEdit {
                    add: Some(vec!["EXECUTE".to_string()]),
                    ..PermissionEdit::default()
                }
            )
            .await
            .unwrap_err(),
        FsError::UnknownFlag(_)
    ));

    // Editing without ADMIN on the node is denied.
    let plain = engine
        .create_file("plain.txt", None, None, Some(7))
        .await
        .unwrap();
    assert!(matches!(
        manager
            .set(
                plain.id,
                PermissionEdit {
                    mask: Some(15),
                    ..PermissionEdit::default()
                }
            )
            .await
            .unwrap_err(),
        FsError::PermissionDenied {
            required: Permission::Admin
        }
    ));
}

#[tokio::test]
async fn test_zero_mask_locks_every_mutation() {
    let (engine, search, store) = setup().await;
    let node = engine
        .create_file("locked.txt", None, Some("secret".to_string()), Some(15))
        .await
        .unwrap();

    let manager = PermissionManager::new(store.clone());
    manager
        .set(
            node.id,
            PermissionEdit {
                mask: Some(0),
                ..PermissionEdit::default()
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.get_file(node.id).await.unwrap_err(),
        FsError::PermissionDenied {
            required: Permission::Read
        }
    ));
    assert!(matches!(
        engine
            .rename_or_move(
                node.id,
                NodeType::File,
                RenameMove {
                    name: Some("renamed.txt".to_string()),
                    ..RenameMove::default()
                }
            )
            .await
            .unwrap_err(),
        FsError::PermissionDenied {
            required: Permission::Write
        }
    ));
    assert!(matches!(
        engine.trash_file(node.id).await.unwrap_err(),
        FsError::PermissionDenied {
            required: Permission::Delete
        }
    ));
    assert!(matches!(
        manager
            .set(
                node.id,
                PermissionEdit {
                    mask: Some(15),
                    ..PermissionEdit::default()
                }
            )
            .await
            .unwrap_err(),
        FsError::PermissionDenied {
            required: Permission::Admin
        }
    ));

    // And search no longer surfaces it.
    let hits = search.search(&SearchRequest::new("locked")).await.unwrap();
    assert!(hits.is_empty());
}
