#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    use taskflow::{AppConfig, Workspace, http_api, logging};

    let config = AppConfig::from_env()?;
    logging::init_tracing(&config.log_filter);

    let state = match &config.db_path {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            use taskflow::{SqliteWorkspaceStore, WorkspaceStore};

            let store = SqliteWorkspaceStore::new(path)?;
            let workspace = store.load_workspace()?.unwrap_or_default();
            tracing::info!(db = %path.display(), "workspace store opened");
            http_api::AppState::with_store(workspace, Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            tracing::warn!(db = %path.display(), "built without `sqlite`; running in memory");
            http_api::AppState::new(Workspace::new())
        }
        None => http_api::AppState::new(Workspace::new()),
    };

    println!("taskflow HTTP API listening on http://{}", config.http_addr);
    http_api::serve(config.http_addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
