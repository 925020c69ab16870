//! Broker connection lifecycle
//!
//! The client context reports cluster-wide failures as disconnect events on a
//! bounded channel. `supervise` turns each event into exactly one reconnect
//! attempt; events queued while the attempt is pending are coalesced.

use super::BrokerError;
use crate::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Observable connection state of a broker client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    fn gauge_value(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publish a state change to watchers and the connection gauge
pub(crate) fn set_state(tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    let previous = tx.send_replace(state);
    metrics::BROKER_CONNECTION_STATE.set(state.gauge_value());
    if previous != state {
        info!(from = %previous, to = %state, "Broker connection state changed");
    }
}

/// A client the supervisor can reconnect
#[async_trait]
pub trait Reconnect: Send + Sync {
    fn state(&self) -> ConnectionState;

    async fn reconnect(&self) -> Result<(), BrokerError>;
}

/// Run until shutdown or until every event sender is dropped
///
/// Returns the number of reconnect attempts made.
pub async fn supervise<R>(
    client: Arc<R>,
    mut events: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64
where
    R: Reconnect + ?Sized,
{
    let mut attempts = 0u64;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Connection supervisor shutting down");
                    break;
                }
            }
            event = events.recv() => {
                let Some(()) = event else {
                    break;
                };

                // Coalesce the backlog into this one attempt
                let mut coalesced = 0u32;
                while events.try_recv().is_ok() {
                    coalesced += 1;
                }

                if client.state() == ConnectionState::Connected {
                    continue;
                }

                attempts += 1;
                warn!(coalesced, "Broker disconnected, attempting reconnect");
                match client.reconnect().await {
                    Ok(()) => info!("Broker reconnected"),
                    Err(e) => warn!(
                        error = %e,
                        "Reconnect attempt failed; the next publish will retry"
                    ),
                }
            }
        }
    }

    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeClient {
        state: Mutex<ConnectionState>,
        calls: AtomicU32,
        succeed: bool,
    }

    impl FakeClient {
        fn new(state: ConnectionState, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(state),
                calls: AtomicU32::new(0),
                succeed,
            })
        }
    }

    #[async_trait]
    impl Reconnect for FakeClient {
        fn state(&self) -> ConnectionState {
            *self.state.lock()
        }

        async fn reconnect(&self) -> Result<(), BrokerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                *self.state.lock() = ConnectionState::Connected;
                Ok(())
            } else {
                Err(BrokerError::NotConnected)
            }
        }
    }

    #[tokio::test]
    async fn test_queued_events_coalesce_into_one_attempt() {
        let client = FakeClient::new(ConnectionState::Disconnected, false);
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        for _ in 0..3 {
            tx.send(()).await.unwrap();
        }
        drop(tx);

        let attempts = supervise(client.clone(), rx, shutdown_rx).await;
        assert_eq!(attempts, 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_not_fatal() {
        let client = FakeClient::new(ConnectionState::Disconnected, false);
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(supervise(client.clone(), rx, shutdown_rx));
        tx.send(()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tx.send(()).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_event_ignored_when_already_connected() {
        let client = FakeClient::new(ConnectionState::Connected, true);
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(()).await.unwrap();
        drop(tx);

        assert_eq!(supervise(client.clone(), rx, shutdown_rx).await, 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let client = FakeClient::new(ConnectionState::Disconnected, true);
        let (_tx, rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(supervise(client, rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[test]
    fn test_set_state_notifies_watchers() {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        set_state(&tx, ConnectionState::Connected);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);
    }
}
