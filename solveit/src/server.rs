use futures::future::join_all;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use solveit_api::{create_router, AppState};
use solveit_core::repository::{DraftRepository, FileRecordRepository, TaskRepository};
use solveit_core::storage::ObjectStorage;
use solveit_core::Config;
use solveit_hub::Relays;
use solveit_worker::{build_scheduler, Scheduler, WorkerContext};

pub struct SolveItServer {
    config: Config,
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
    relays: Relays,
    shutdown: CancellationToken,
}

impl SolveItServer {
    pub fn new(
        config: Config,
        pool: PgPool,
        storage: Arc<dyn ObjectStorage>,
        relays: Relays,
    ) -> Self {
        Self {
            config,
            pool,
            storage,
            relays,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start every component, then block until a shutdown signal or an
    /// unexpected HTTP server exit
    pub async fn run(self) -> anyhow::Result<()> {
        let pumps = self.relays.spawn_pumps(&self.shutdown);
        info!("Started {} relay pumps", pumps.len());

        let scheduler = self.start_jobs();
        let mut http_handle = self.start_http_server().await?;

        info!("All components started successfully");

        let http_stopped = tokio::select! {
            result = &mut http_handle => {
                if let Err(e) = result {
                    error!("HTTP server task failed: {}", e);
                }
                error!("HTTP server stopped unexpectedly");
                true
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
                false
            }
        };

        // Stops accepting requests, ends websocket sessions, relay pumps and job timers
        self.shutdown.cancel();

        if !http_stopped {
            if let Err(e) = http_handle.await {
                error!("HTTP server task failed: {}", e);
            }
        }

        join_all(pumps).await;
        info!("Relay pumps stopped");

        if let Some(scheduler) = scheduler {
            info!("Waiting for in-flight background jobs...");
            scheduler.wait().await;
            info!("Background jobs stopped");
        }

        self.pool.close().await;
        info!("Database pool closed");
        info!("SolveIt server shut down");
        Ok(())
    }

    fn start_jobs(&self) -> Option<Scheduler> {
        if !self.config.worker.enabled {
            info!("Background jobs disabled");
            return None;
        }

        let ctx = WorkerContext {
            tasks: Arc::new(TaskRepository::new(self.pool.clone())),
            files: Arc::new(FileRecordRepository::new(self.pool.clone())),
            drafts: Arc::new(DraftRepository::new(self.pool.clone())),
            storage: Arc::clone(&self.storage),
            notifications: Arc::clone(&self.relays.notifications),
        };
        let scheduler = build_scheduler(&self.config.worker, ctx);
        scheduler.start(&self.shutdown);
        info!("Started {} background jobs", scheduler.jobs().len());
        Some(scheduler)
    }

    /// Bind the HTTP listener and serve with graceful shutdown
    async fn start_http_server(&self) -> anyhow::Result<JoinHandle<()>> {
        let http_addr = self.config.http_address();
        let listener = TcpListener::bind(&http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;
        info!("HTTP server listening on {}", http_addr);

        let state = AppState::new(
            self.relays.clone(),
            self.config.server.allowed_origins.clone(),
            self.shutdown.clone(),
        );
        let router = create_router(state);
        let graceful = self.shutdown.clone().cancelled_owned();

        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }
            info!("HTTP server shut down gracefully");
        }))
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
