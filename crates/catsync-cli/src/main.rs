//! catsync - keep a live copy of the storefront category list.
//!
//! Fetches the category list over HTTP, subscribes to the push channel for
//! changes and falls back to the last saved list when the backend is down.

mod output;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use catsync_core::service::{CategoryFetcher, FetchOutcome};
use catsync_core::{
    ApiClient, CacheState, CategorySyncService, CategoryTree, Config, FallbackStore, FileStore,
    SyncDeps, SyncOptions, WsConnector,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: catsync [COMMAND]

Commands:
  watch                     Fetch categories and follow live updates (default)
  fetch [--json]            Fetch categories once
  tree [PARENT_ID [CHILD_ID]]
                            Show the category tree, optionally expanding a branch
  clear-cache               Remove every locally cached category list
  help                      Show this message

Environment:
  CATSYNC_API_URL, CATSYNC_WS_URL, CATSYNC_SESSION_ID, RUST_LOG";

/// Log file name inside the cache directory
const LOG_FILE: &str = "catsync.log";

enum Command {
    Watch,
    Fetch { json: bool },
    Tree { parent: Option<i64>, child: Option<i64> },
    ClearCache,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let command = match args.first().map(String::as_str) {
        None | Some("watch") => Command::Watch,
        Some("fetch") => Command::Fetch {
            json: args[1..].iter().any(|a| a == "--json"),
        },
        Some("tree") => {
            let parse_id = |arg: Option<&String>| -> Result<Option<i64>> {
                arg.map(|a| a.parse::<i64>().with_context(|| format!("Invalid category id: {}", a)))
                    .transpose()
            };
            Command::Tree {
                parent: parse_id(args.get(1))?,
                child: parse_id(args.get(2))?,
            }
        }
        Some("clear-cache") => Command::ClearCache,
        Some("help") | Some("--help") | Some("-h") => Command::Help,
        Some(other) => anyhow::bail!("Unknown command: {}\n\n{}", other, USAGE),
    };
    Ok(command)
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g., RUST_LOG=catsync_core=debug).
/// The returned guard must live until exit so the file log is flushed.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_store(config: &Config) -> FileStore {
    let session_id = config.resolve_session_id();
    FileStore::new(config.session_dir(&session_id), config.cache_dir().ok())
        .with_sessions_root(config.sessions_root())
        .ephemeral(config.has_ephemeral_session())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if let Command::Help = command {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load config")?;
    config.apply_env();

    let log_dir = if config.log_to_file {
        config.cache_dir().ok()
    } else {
        None
    };
    let _log_guard = init_tracing(log_dir);
    info!(api = %config.api_base_url, ws = %config.ws_url(), "catsync starting");

    match command {
        Command::Watch => watch(&config).await,
        Command::Fetch { json } => fetch_once(&config, json).await,
        Command::Tree { parent, child } => show_tree(&config, parent, child).await,
        Command::ClearCache => clear_cache(&config),
        Command::Help => Ok(()),
    }
}

/// Run the sync service and reprint the list whenever it changes, until Ctrl-C.
async fn watch(config: &Config) -> Result<()> {
    let client = ApiClient::new(config).context("Failed to build HTTP client")?;
    let handle = CategorySyncService::start(
        SyncDeps {
            source: Arc::new(client),
            connector: Arc::new(WsConnector),
            store: Arc::new(build_store(config)),
        },
        SyncOptions::from_config(config),
    );

    let mut updates = handle.subscribe();
    let mut shown: Option<CacheState> = None;
    loop {
        let state = updates.borrow_and_update().clone();
        // Loading flips are noise on a terminal.
        let visible = CacheState {
            is_loading: false,
            ..state
        };
        if shown.as_ref() != Some(&visible) {
            println!("{}\n", output::render_state(&visible));
            shown = Some(visible);
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Shutting down category sync");
    handle.shutdown().await;
    Ok(())
}

async fn fetch_once(config: &Config, json: bool) -> Result<()> {
    let client = ApiClient::new(config).context("Failed to build HTTP client")?;
    let store = Arc::new(build_store(config));
    let fetcher = CategoryFetcher::new(Arc::new(client), store.clone());
    let outcome = fetcher.fetch().await;
    store.end_session();

    let categories = match outcome {
        FetchOutcome::Fetched { categories, .. } => categories,
        FetchOutcome::Failed { error, fallback } => {
            eprintln!("{}", error);
            match fallback {
                Some(snapshot) => {
                    eprintln!("Showing saved list from {}", snapshot.age_display());
                    snapshot.categories
                }
                None => anyhow::bail!("No saved category list to fall back on"),
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        println!("{}", output::render_categories(&categories));
    }
    Ok(())
}

async fn show_tree(config: &Config, parent: Option<i64>, child: Option<i64>) -> Result<()> {
    let client = ApiClient::new(config).context("Failed to build HTTP client")?;
    let nodes = client
        .fetch_category_tree()
        .await
        .context("Failed to load category tree")?;

    let mut tree = CategoryTree::new(nodes);
    tree.select_parent(parent);
    tree.select_child(child);
    if parent.is_some() && tree.selected_parent_node().is_none() {
        anyhow::bail!("No top-level category with id {}", parent.unwrap_or_default());
    }
    if child.is_some() && tree.selected_child_node().is_none() {
        anyhow::bail!("No subcategory with id {}", child.unwrap_or_default());
    }

    println!("{}", output::render_tree(&tree));
    if let Some(id) = tree.active_filter() {
        println!("\nProduct filter: category={}", id);
    }
    Ok(())
}

fn clear_cache(config: &Config) -> Result<()> {
    build_store(config).purge();
    println!("Local category caches cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_defaults_to_watch() {
        assert!(matches!(parse_args(&[]), Ok(Command::Watch)));
        assert!(matches!(parse_args(&args(&["watch"])), Ok(Command::Watch)));
    }

    #[test]
    fn test_parse_args_commands() {
        assert!(matches!(
            parse_args(&args(&["fetch", "--json"])),
            Ok(Command::Fetch { json: true })
        ));
        assert!(matches!(
            parse_args(&args(&["tree", "4", "17"])),
            Ok(Command::Tree {
                parent: Some(4),
                child: Some(17)
            })
        ));
        assert!(matches!(
            parse_args(&args(&["clear-cache"])),
            Ok(Command::ClearCache)
        ));
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(&args(&["tree", "shoes"])).is_err());
        assert!(parse_args(&args(&["sync"])).is_err());
    }
}
