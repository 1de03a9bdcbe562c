use std::future::Future;
use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Listen for SIGTERM and SIGINT and cancel the returned token on the first
/// one. The API server stops accepting requests and the photo dispatcher
/// stops claiming when it fires.
///
/// Fails if the signal handlers cannot be registered.
pub fn install_shutdown_handler() -> io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(cancel_on(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    }))
}

/// Cancel a fresh token once `trigger` resolves with the name of what fired.
fn cancel_on<F>(trigger: F) -> CancellationToken
where
    F: Future<Output = &'static str> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        let cause = trigger.await;
        tracing::info!(signal = cause, "Shutdown signal received, draining");
        cancel.cancel();
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_token_cancelled_only_after_trigger() {
        let (fire, fired) = oneshot::channel::<()>();
        let token = cancel_on(async move {
            let _ = fired.await;
            "SIGTERM"
        });

        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());

        fire.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token was not cancelled");
    }
}
