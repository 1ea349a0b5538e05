//! Connection-lifecycle supervision.
//!
//! Registration routines (directory entries, discovery loops, session
//! acquisition) are re-driven from their root after every reconnection and
//! cancelled as soon as the connection is suspended or lost.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{ConnectionState, Coordinator};
use crate::error::CoordError;
use crate::retry::retry_delay;

async fn next_disconnect(events: &mut broadcast::Receiver<ConnectionState>) -> bool {
    loop {
        match events.recv().await {
            Ok(ConnectionState::Suspended | ConnectionState::Lost) => return true,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return false,
        }
    }
}

async fn next_reconnect(events: &mut broadcast::Receiver<ConnectionState>) -> bool {
    loop {
        match events.recv().await {
            Ok(ConnectionState::Reconnected) => return true,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return false,
        }
    }
}

/// Runs `routine` now and again from scratch after every reconnection.
///
/// A running routine is dropped when the connection is suspended or lost.
/// Transient failures while connected are retried after a backoff; other
/// failures are logged and the routine waits for the next reconnection.
/// Returns once the coordinator's event channel closes.
pub async fn supervise<F, Fut>(coordinator: Arc<dyn Coordinator>, name: &str, mut routine: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CoordError>>,
{
    let mut events = coordinator.connection_events();
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::select! {
            result = routine() => Some(result),
            still_open = next_disconnect(&mut events) => {
                if !still_open {
                    return;
                }
                warn!(routine = name, "coordination connection interrupted, routine suspended");
                None
            }
        };

        match outcome {
            Some(Ok(())) => {
                attempt = 0;
                debug!(routine = name, "coordination routine completed");
            }
            Some(Err(e)) if e.is_transient() => {
                attempt += 1;
                let delay = retry_delay(attempt);
                warn!(
                    routine = name,
                    error = %e,
                    attempt,
                    retry_delay_ms = delay.as_millis() as u64,
                    "coordination routine failed transiently, retrying"
                );
                sleep(delay).await;
                continue;
            }
            Some(Err(e)) if e.is_connectivity() => {
                info!(routine = name, error = %e, "coordination session gone, waiting for reconnection");
            }
            Some(Err(e)) => {
                warn!(routine = name, error = %e, "coordination routine failed");
            }
            None => {}
        }

        if !next_reconnect(&mut events).await {
            return;
        }
        attempt = 0;
        info!(routine = name, "coordination reconnected, replaying routine from the root");
    }
}

/// Spawns [`supervise`] on the runtime.
pub fn spawn_supervised<F, Fut>(
    coordinator: Arc<dyn Coordinator>,
    name: &'static str,
    routine: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CoordError>> + Send + 'static,
{
    tokio::spawn(async move { supervise(coordinator, name, routine).await })
}

/// Tracks whether the coordination connection is currently usable.
///
/// Orchestration consults the gate before producing externally visible
/// effects; while it is closed, work stays queued.
#[derive(Clone)]
pub struct ConnectionGate {
    open: Arc<AtomicBool>,
}

impl ConnectionGate {
    /// Starts tracking `coordinator`'s connection state. The gate starts open.
    pub fn track(coordinator: &dyn Coordinator) -> Self {
        let gate = Self::always_open();
        let open = gate.open.clone();
        let mut events = coordinator.connection_events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectionState::Connected | ConnectionState::Reconnected) => {
                        open.store(true, Ordering::SeqCst);
                    }
                    Ok(ConnectionState::Suspended | ConnectionState::Lost) => {
                        open.store(false, Ordering::SeqCst);
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        gate
    }

    /// A gate that never closes.
    pub fn always_open() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
