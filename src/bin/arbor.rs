//! Arbor CLI Binary
//!
//! Thin admin shell over the tree engine: list, create, move, trash,
//! restore, purge, search, and permission edits against one database.

use arbor::config::ArborConfig;
use arbor::engine::{RenameMove, RestoreDest, TreeEngine};
use arbor::logging::init_logging;
use arbor::perms::{PermissionEdit, PermissionManager};
use arbor::search::{SearchEngine, SearchRequest};
use arbor::store::{Node, SqliteNodeStore};
use arbor::types::{NodeId, NodeType, SearchScope, SortDirection, SortKey, TrashSortKey};
use arbor::views::{to_views, NodeView};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Arbor - virtual file system over a relational store
#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Virtual hierarchical file system over a relational store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database URL (overrides configuration)
    #[arg(long)]
    database: Option<String>,

    /// Emit results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List live children of a directory (root level by default)
    Ls {
        #[arg(long)]
        parent: Option<NodeId>,
        #[arg(long, default_value = "name")]
        sort: String,
        #[arg(long, default_value = "asc")]
        order: String,
    },
    /// List every live directory
    Dirs,
    /// Create a directory
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<NodeId>,
        #[arg(long)]
        permissions: Option<i64>,
    },
    /// Create a file
    Touch {
        name: String,
        #[arg(long)]
        parent: Option<NodeId>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        permissions: Option<i64>,
    },
    /// Print one file, content included
    Cat { id: NodeId },
    /// Rename and/or move a node
    Mv {
        id: NodeId,
        /// Node kind: file or dir
        #[arg(long, value_parser = parse_kind)]
        kind: NodeType,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "to_root")]
        parent: Option<NodeId>,
        /// Move to root level
        #[arg(long)]
        to_root: bool,
        /// Replace file content
        #[arg(long)]
        content: Option<String>,
    },
    /// Soft-delete a node (directories cascade over the whole subtree)
    Trash {
        id: NodeId,
        #[arg(long, value_parser = parse_kind)]
        kind: NodeType,
    },
    /// List trashed nodes
    TrashList {
        #[arg(long, default_value = "trashed_at")]
        sort: String,
        #[arg(long, default_value = "desc")]
        order: String,
    },
    /// Restore a trashed node (original parent unless told otherwise)
    Restore {
        id: NodeId,
        #[arg(long, conflicts_with = "to_root")]
        parent: Option<NodeId>,
        #[arg(long)]
        to_root: bool,
    },
    /// Permanently delete a trashed subtree
    Purge { id: NodeId },
    /// Search names and content
    Search {
        query: String,
        #[arg(long, default_value = "both")]
        scope: String,
        #[arg(long)]
        include_trash: bool,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<NodeType>,
        #[arg(long)]
        parent: Option<NodeId>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, default_value = "name")]
        sort: String,
        #[arg(long, default_value = "asc")]
        order: String,
    },
    /// Read or edit a node's permission mask
    Perms {
        #[command(subcommand)]
        command: PermsCommands,
    },
}

#[derive(Subcommand)]
enum PermsCommands {
    /// Show the mask and decoded flags
    Get { id: NodeId },
    /// Edit the mask: absolute value and/or flag deltas
    Set {
        id: NodeId,
        #[arg(long)]
        mask: Option<i64>,
        #[arg(long, value_delimiter = ',')]
        add: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        remove: Option<Vec<String>>,
    },
}

fn parse_kind(value: &str) -> Result<NodeType, String> {
    match value {
        "file" => Ok(NodeType::File),
        "dir" | "directory" => Ok(NodeType::Directory),
        other => Err(format!("unknown kind '{}' (use file or dir)", other)),
    }
}

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ArborConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.database {
        config.database.url = url.clone();
    }
    init_logging(Some(&config.logging))?;

    let store = Arc::new(
        SqliteNodeStore::connect_with(&config.database.url, config.database.max_connections)
            .await?,
    );
    let engine = TreeEngine::with_default_permissions(store.clone(), config.node.permissions);

    match cli.command {
        Commands::Ls { parent, sort, order } => {
            let nodes = engine
                .list_children(parent, SortKey::parse(&sort), SortDirection::parse(&order))
                .await?;
            print_nodes(nodes, cli.json)?;
        }
        Commands::Dirs => {
            let nodes = engine.list_directories().await?;
            print_nodes(nodes, cli.json)?;
        }
        Commands::Mkdir {
            name,
            parent,
            permissions,
        } => {
            let node = engine.create_directory(&name, parent, permissions).await?;
            print_node(node, cli.json)?;
        }
        Commands::Touch {
            name,
            parent,
            content,
            permissions,
        } => {
            let node = engine.create_file(&name, parent, content, permissions).await?;
            print_node(node, cli.json)?;
        }
        Commands::Cat { id } => {
            let node = engine.get_file(id).await?;
            if cli.json {
                print_node(node, true)?;
            } else if let Some(content) = &node.content {
                println!("{}", content);
            }
        }
        Commands::Mv {
            id,
            kind,
            name,
            parent,
            to_root,
            content,
        } => {
            let parent_id = if to_root { Some(None) } else { parent.map(Some) };
            let node = engine
                .rename_or_move(
                    id,
                    kind,
                    RenameMove {
                        name,
                        parent_id,
                        content,
                    },
                )
                .await?;
            print_node(node, cli.json)?;
        }
        Commands::Trash { id, kind } => {
            let outcome = match kind {
                NodeType::Directory => engine.trash_directory(id).await?,
                NodeType::File => engine.trash_file(id).await?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("trashed {} node(s)", outcome.trashed_count);
            }
        }
        Commands::TrashList { sort, order } => {
            let nodes = engine
                .list_trash(TrashSortKey::parse(&sort), SortDirection::parse(&order))
                .await?;
            print_nodes(nodes, cli.json)?;
        }
        Commands::Restore {
            id,
            parent,
            to_root,
        } => {
            let dest = if to_root {
                RestoreDest::Root
            } else {
                match parent {
                    Some(parent_id) => RestoreDest::Parent(parent_id),
                    None => RestoreDest::OriginalParent,
                }
            };
            let node = engine.restore(id, dest).await?;
            print_node(node, cli.json)?;
        }
        Commands::Purge { id } => {
            let outcome = engine.purge(id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("purged {} node(s)", outcome.purged_count);
            }
        }
        Commands::Search {
            query,
            scope,
            include_trash,
            kind,
            parent,
            limit,
            sort,
            order,
        } => {
            let search = SearchEngine::with_config(store.clone(), config.search.clone());
            let nodes = search
                .search(&SearchRequest {
                    query,
                    scope: SearchScope::parse(&scope),
                    include_trash,
                    node_type: kind,
                    parent_id: parent.map(Some),
                    limit,
                    sort: SortKey::parse(&sort),
                    direction: SortDirection::parse(&order),
                })
                .await?;
            print_nodes(nodes, cli.json)?;
        }
        Commands::Perms { command } => {
            let manager = PermissionManager::new(store.clone());
            let view = match command {
                PermsCommands::Get { id } => manager.get(id).await?,
                PermsCommands::Set {
                    id,
                    mask,
                    add,
                    remove,
                } => manager.set(id, PermissionEdit { mask, add, remove }).await?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("mask={} flags={}", view.mask, view.flags.join("|"));
            }
        }
    }

    Ok(())
}

fn print_node(node: Node, json: bool) -> anyhow::Result<()> {
    if json {
        let view = NodeView::from(node);
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("{}", format_line(&node));
    }
    Ok(())
}

fn print_nodes(nodes: Vec<Node>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&to_views(nodes))?);
    } else {
        for node in &nodes {
            println!("{}", format_line(node));
        }
    }
    Ok(())
}

fn format_line(node: &Node) -> String {
    let marker = match node.node_type {
        NodeType::Directory => "d",
        NodeType::File => "f",
    };
    let trash = if node.is_trashed { " [trash]" } else { "" };
    format!(
        "{:>6}  {}  perm={:<2}  size={:<8}  {}{}",
        node.id, marker, node.permissions, node.size, node.name, trash
    )
}
