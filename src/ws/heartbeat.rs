//! Heartbeat/liveness monitor.
//!
//! Every ping interval the monitor sweeps the registry: connections
//! that missed the previous ping are closed and their disconnect is
//! announced; survivors get a fresh ping. Eviction happens after a
//! single missed round-trip — an aggressive, deliberate choice with no
//! multi-strike tolerance.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnectionRegistry, EventBus, UiEvent};

/// Runs the heartbeat sweep loop until `shutdown` fires.
pub async fn run_heartbeat(
    registry: Arc<ConnectionRegistry>,
    event_bus: EventBus,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so fresh connections
    // get a full interval before their first ping.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = registry.sweep().await;
                for gone in evicted {
                    tracing::warn!(client_id = %gone.id, "evicting unresponsive vr client");
                    event_bus.publish(UiEvent::UnityDisconnected {
                        client_id: gone.id,
                        session_id: gone.session_id,
                        timestamp: Utc::now(),
                    });
                }
            }
            () = shutdown.cancelled() => {
                tracing::debug!("heartbeat monitor stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Outbound;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn silent_connection_evicted_within_two_intervals() {
        let registry = Arc::new(ConnectionRegistry::new());
        let event_bus = EventBus::new(16);
        let mut ui_rx = event_bus.subscribe();
        let shutdown = CancellationToken::new();

        let (tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let id = registry.register(tx).await;

        let monitor = tokio::spawn(run_heartbeat(
            Arc::clone(&registry),
            event_bus,
            Duration::from_secs(30),
            shutdown.clone(),
        ));

        // One interval: ping goes out, liveness flag drops.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(out_rx.recv().await, Some(Outbound::Ping));

        // No pong: the next sweep evicts and announces the disconnect.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(out_rx.recv().await, Some(Outbound::Close));
        assert!(registry.get(id).await.is_none());

        let Ok(event) = ui_rx.recv().await else {
            panic!("expected disconnect event");
        };
        assert_eq!(event.channel(), "unity-disconnected");

        shutdown.cancel();
        let _ = monitor.await;
    }

    #[tokio::test(start_paused = true)]
    async fn responsive_connection_survives_sweeps() {
        let registry = Arc::new(ConnectionRegistry::new());
        let event_bus = EventBus::new(16);
        let shutdown = CancellationToken::new();

        let (tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let id = registry.register(tx).await;

        let monitor = tokio::spawn(run_heartbeat(
            Arc::clone(&registry),
            event_bus,
            Duration::from_secs(30),
            shutdown.clone(),
        ));

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(31)).await;
            assert_eq!(out_rx.recv().await, Some(Outbound::Ping));
            // Simulate the pong arriving.
            registry.mark_alive(id).await;
        }

        assert!(registry.get(id).await.is_some());
        shutdown.cancel();
        let _ = monitor.await;
    }
}
