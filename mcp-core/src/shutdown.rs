use tokio_util::sync::CancellationToken;

/// Resolves once the process receives SIGINT (or, on unix, SIGTERM),
/// Paired with a
/// [`CancellationToken`] so long-running tasks (background sweeps, the
/// execution worker pool) can be told to wind down before the process exits.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Installs the signal handler and cancels `token` when it fires, logging
/// the shutdown so it shows up in the same structured log stream as every
/// other lifecycle event.
pub fn spawn_shutdown_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received, cancelling background work");
        token.cancel();
    });
}
