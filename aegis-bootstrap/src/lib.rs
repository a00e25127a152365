// /////////////////////////////////////////////////////////////////////////////
// Aegis Log Ingestion & Detection Pipeline
// SPDX-License-Identifier: Apache-2.0
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap
//!
//! Sits outside the domain/application/infrastructure layers and gives
//! every Aegis service binary (collector, processor, detector,
//! responder, dispatcher) the same entry-point shape:
//!
//! - [`signals`] — OS signal handling (SIGTERM/SIGINT/SIGHUP → a single
//!   shutdown callback)
//! - [`shutdown`] — cancellation token + grace period coordination
//! - [`exit_code`] — the three-code exit contract service processes honor
//!
//! Domain and application code never depend on this crate; only the
//! `[[bin]]` entry points do.

pub mod exit_code;
pub mod shutdown;
pub mod signals;

pub use exit_code::ExitCode;
pub use shutdown::ShutdownCoordinator;
pub use signals::{create_signal_handler, SystemSignals};

use std::future::Future;

/// Runs a worker's main loop under signal-driven graceful shutdown:
/// spawns the platform signal handler, runs `run_once` in a loop until
/// either it returns an error or the shutdown token is cancelled, then
/// waits out the grace period before returning.
///
/// `run_once` should perform one unit of work (one poll cycle) and
/// return quickly so the loop notices cancellation promptly; it is the
/// caller's job to size that unit appropriately (the bus clients' own
/// poll timeouts already bound it).
pub async fn run_until_shutdown<F, Fut>(grace_period: std::time::Duration, mut run_once: F) -> Result<(), anyhow::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), anyhow::Error>>,
{
    let coordinator = ShutdownCoordinator::new(grace_period);
    let token = coordinator.token();

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        create_signal_handler().wait_for_signal(Box::new(move || signal_coordinator.initiate_shutdown())).await;
    });

    let result = loop {
        if token.is_cancelled() {
            break Ok(());
        }
        tokio::select! {
            _ = token.cancelled() => break Ok(()),
            result = run_once() => {
                if let Err(err) = result {
                    break Err(err);
                }
            }
        }
    };

    coordinator.complete_shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn run_until_shutdown_stops_on_first_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = run_until_shutdown(Duration::from_millis(50), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("boom"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
