pub mod challenge;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::oneshot;

use crate::config::AuthConfig;
use crate::monitor::Monitor;

pub use challenge::{ChallengeResponse, ChallengeVerifier};

#[derive(Clone)]
pub(crate) struct AppState {
    monitor: Arc<Monitor>,
    verifier: Arc<ChallengeVerifier>,
    auth: Arc<AuthConfig>,
}

/// HTTP front end: provider callbacks, trigger links and the command API
pub struct CallbackServer {
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    pub fn new(monitor: Arc<Monitor>, verifier: ChallengeVerifier, auth: AuthConfig) -> Self {
        Self {
            state: AppState {
                monitor,
                verifier: Arc::new(verifier),
                auth: Arc::new(auth),
            },
            shutdown_tx: None,
        }
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Bind and serve in the background. Returns the bound address, which
    /// differs from `port` when it is 0.
    pub async fn start(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind {}:{}", host, port))?;
        let addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(tx);

        let app = self.router();
        tracing::info!("Callback server listening on {}", addr);

        tokio::spawn(async move {
            let server = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                    tracing::info!("Callback server shutting down");
                });
            if let Err(e) = server.await {
                tracing::error!("Callback server error: {}", e);
            }
        });

        Ok(addr)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}
