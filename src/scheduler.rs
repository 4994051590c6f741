//! Periodic background tasks.
//!
//! The teacher watches the filesystem for live events and debounces them;
//! this server has no live watch requirement, only interval-driven sweeps
//! (index scan, archive reconciliation), so the debounce loop's
//! "background thread/task that never overlaps itself" shape is re-targeted
//! to plain `tokio::time::interval` ticking, shut down the same way the
//! teacher's `shutdown_signal` does.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawns a named task that runs `job` on a fixed interval, skipping a tick
/// if the previous run is still in flight, and stopping cleanly when `token`
/// is cancelled.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    token: CancellationToken,
    job: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(task = name, "scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if running.swap(true, Ordering::SeqCst) {
                        warn!(task = name, "previous run still in flight, skipping tick");
                        continue;
                    }
                    job().await;
                    running.store(false, Ordering::SeqCst);
                }
            }
        }
    })
}

/// Resolves once SIGINT or SIGTERM is received, signalling a graceful
/// shutdown (passed to `axum::serve(...).with_graceful_shutdown(...)` and
/// used to cancel every scheduler task).
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn skips_overlapping_ticks() {
        let token = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);

        let handle = spawn_periodic("test-job", Duration::from_millis(10), token.clone(), move || {
            let runs = Arc::clone(&runs_clone);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        tokio::time::advance(Duration::from_millis(250)).await;
        token.cancel();
        let _ = handle.await;

        assert!(runs.load(Ordering::SeqCst) >= 1);
    }
}
