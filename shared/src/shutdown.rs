use std::time::Duration;

/// Maximum time to wait for in-flight work during graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves when the process is asked to stop (Ctrl+C, or SIGTERM on Unix).
///
/// # Panics
///
/// Panics if a signal handler cannot be installed.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler");
        sigterm.recv().await;
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let signal = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("Failed to install Ctrl+C handler");
            "Ctrl+C"
        }
        name = terminate => name,
    };

    tracing::info!(%signal, "Shutdown signal received, draining");
}
