// crates/noesis-engine/src/cli/serve.rs
// MCP server initialization and main loop.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::EnvConfig;
use crate::dispatcher::Dispatcher;
use crate::mcp::NoesisServer;
use crate::registry::ToolRegistry;
use crate::store::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use crate::tools::register_builtin_tools;
use crate::workflow::WorkflowEngine;

use super::default_db_path;

pub async fn run_mcp_server() -> Result<()> {
    let config = EnvConfig::load();
    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }

    let registry = ToolRegistry::new();
    register_builtin_tools(&registry)?;

    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));

    let store: Arc<dyn SessionStore> = match &config.db_path {
        Some(path) => {
            info!(db_path = %path, "opening sqlite session store");
            Arc::new(SqliteSessionStore::open(path).await?)
        }
        None => {
            let path = default_db_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            info!(db_path = %path.display(), "opening sqlite session store (default path)");
            Arc::new(SqliteSessionStore::open(&path).await?)
        }
    };

    let engine = WorkflowEngine::new(registry.clone(), dispatcher.clone(), store.clone(), config.workflow_workers);

    let resumed = engine.recover().await?;
    if resumed > 0 {
        info!(resumed, "resumed in-flight workflow runs from the session store");
    }

    let server = NoesisServer::new(registry, dispatcher, engine, store);

    info!("starting MCP server over stdio");
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport).await?;
    service.waiting().await?;

    Ok(())
}

/// A server built entirely in-memory, for tests and the CLI's standalone
/// `workflow run` command where durability across process restarts isn't
/// needed.
pub fn build_in_memory() -> (ToolRegistry, Arc<Dispatcher>, WorkflowEngine) {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry).expect("builtin tool names are never empty");
    let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::default());
    let engine = WorkflowEngine::new(registry.clone(), dispatcher.clone(), store, EnvConfig::load().workflow_workers);
    (registry, dispatcher, engine)
}
