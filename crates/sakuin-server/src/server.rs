use std::future::Future;
use std::sync::Arc;

use sakuin_index::{Indexer, IndexerConfig};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// sakuin HTTP server.
pub struct SakuinServer {
    config: ServerConfig,
    state: AppState,
}

impl SakuinServer {
    /// Open the configured stores and build an indexer over them.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let (objects, documents) = config.storage.open()?;
        let mut indexer_config = IndexerConfig::new(objects, documents);
        indexer_config.timeout = config.request_timeout();
        let indexer = Arc::new(Indexer::new(indexer_config));
        Ok(Self::with_indexer(config, indexer))
    }

    /// Serve an existing indexer.
    pub fn with_indexer(config: ServerConfig, indexer: Arc<Indexer>) -> Self {
        Self {
            config,
            state: AppState::new(indexer),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.state.indexer
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` completes, then cancel in-flight index
    /// operations and wait for their requests to finish.
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            storage = ?self.config.storage,
            "sakuin server listening"
        );

        let cancel = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("shutting down");
                cancel.cancel();
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
