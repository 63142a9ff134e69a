use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{info, warn};

use crate::error::Error;
use crate::webhook::{WebhookState, webhook_router};

/// Grace period for in-flight admission reviews on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

/// Serve the webhook router until SIGINT/SIGTERM.
///
/// The API server only calls webhooks over HTTPS, so plain HTTP is for
/// local testing behind a TLS-terminating proxy.
pub async fn serve(config: ServerConfig, state: Arc<WebhookState>) -> Result<(), Error> {
    let app = webhook_router(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match (config.tls_cert, config.tls_key) {
        (Some(cert), Some(key)) => {
            let tls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .map_err(Error::Tls)?;

            info!(addr = %config.addr, cert = %cert.display(), "Starting webhook server");
            axum_server::bind_rustls(config.addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(Error::Server)
        }
        (cert, key) => {
            if cert.is_some() || key.is_some() {
                warn!("Both --tls-cert and --tls-key are required for TLS, ignoring the one given");
            }
            warn!(addr = %config.addr, "Starting webhook server without TLS");
            axum_server::bind(config.addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(Error::Server)
        }
    }
}

async fn shutdown_on_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining webhook server");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
