use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::util::resolve_db_path;
use clipserve::{
    ActionStore, CommandRegistry, Executor, MemoryActionStore, Server, ServerConfig,
    SqliteActionStore, default_socket_path,
};

pub(crate) fn cmd_serve(
    socket: Option<PathBuf>,
    store: Option<&Path>,
    input_timeout: u64,
) -> Result<()> {
    let mut config = ServerConfig::new(socket.unwrap_or_else(default_socket_path));
    config.db_path = store.map(resolve_db_path);
    config.input_timeout = Duration::from_secs(input_timeout);

    let action_store: Arc<dyn ActionStore> = match &config.db_path {
        Some(path) => {
            info!(path = %path.display(), "Using action database");
            Arc::new(SqliteActionStore::open(path)?)
        }
        None => Arc::new(MemoryActionStore::new()),
    };
    let executor = Arc::new(Executor::new(
        Arc::new(CommandRegistry::with_builtins()),
        action_store,
    ));

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let server = Server::new(config, executor);
        let shutdown = server.shutdown_sender();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received");
                let _ = shutdown.send(());
            }
        });
        server.run().await
    })
}
