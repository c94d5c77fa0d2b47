//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::HubError;
use crate::notifier::poll::SuggestionNotifier;
use crate::permissions::access::AccessRequest;
use crate::server::serve::serve;
use crate::workers::{access_requests, suggestions};

/// Run the hub until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HubError> {
    info!("Initializing homehub {}...", version);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start homehub: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

fn shutdown_future(
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let _ = shutdown_rx.recv().await;
    })
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), HubError> {
    let (app_state, access_rx) = AppState::init(options).await?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_access_request_worker(access_rx, shutdown_manager, shutdown_tx.subscribe())?;

    if options.enable_suggestions {
        init_suggestions_worker(
            options.suggestions_worker.clone(),
            app_state.notifier.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    } else {
        info!("Suggestion polling disabled");
    }

    if options.enable_server {
        init_server(options, &app_state, shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(())
}

fn init_access_request_worker(
    requests: mpsc::UnboundedReceiver<AccessRequest>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HubError> {
    info!("Initializing access request forwarder...");

    let handle = tokio::spawn(async move {
        let forwarded = access_requests::run(requests, shutdown_future(shutdown_rx)).await;
        info!("Forwarded {} access requests", forwarded);
    });

    shutdown_manager.with_access_request_worker_handle(handle)
}

fn init_suggestions_worker(
    options: suggestions::Options,
    notifier: Arc<SuggestionNotifier>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HubError> {
    info!("Initializing suggestion worker...");

    let handle = tokio::spawn(async move {
        suggestions::run(
            &options,
            notifier.as_ref(),
            tokio::time::sleep,
            shutdown_future(shutdown_rx),
        )
        .await;
    });

    shutdown_manager.with_suggestions_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HubError> {
    info!("Initializing local HTTP server...");

    let server_state = Arc::new(app_state.server_state());
    let handle = serve(&options.server, server_state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), HubError>>>,
    suggestions_worker_handle: Option<JoinHandle<()>>,
    access_request_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            suggestions_worker_handle: None,
            access_request_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), HubError> {
        if self.app_state.is_some() {
            return Err(HubError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_suggestions_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), HubError> {
        if self.suggestions_worker_handle.is_some() {
            return Err(HubError::ShutdownError(
                "suggestions_handle already set".to_string(),
            ));
        }
        self.suggestions_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_access_request_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), HubError> {
        if self.access_request_worker_handle.is_some() {
            return Err(HubError::ShutdownError(
                "access_request_handle already set".to_string(),
            ));
        }
        self.access_request_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), HubError>>,
    ) -> Result<(), HubError> {
        if self.server_handle.is_some() {
            return Err(HubError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), HubError> {
        let _ = self.shutdown_tx.send(());

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Shutdown timed out after {:?}, forcing shutdown...", max_delay);
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), HubError> {
        info!("Shutting down homehub...");

        // 1. HTTP server, so no new work arrives
        if let Some(handle) = self.server_handle.take() {
            handle.await.map_err(|e| HubError::ShutdownError(e.to_string()))??;
        }

        // 2. Suggestion worker
        if let Some(handle) = self.suggestions_worker_handle.take() {
            handle.await.map_err(|e| HubError::ShutdownError(e.to_string()))?;
        }

        // 3. Access request forwarder
        if let Some(handle) = self.access_request_worker_handle.take() {
            handle.await.map_err(|e| HubError::ShutdownError(e.to_string()))?;
        }

        // 4. App state
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
