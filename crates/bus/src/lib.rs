//! Cross-Server Bus: a thin layer above the Store Gateway that fixes a
//! channel set and dispatches typed events, with echo suppression and a
//! heartbeat-derived active-server list (spec §4.2).

pub mod channel;
pub mod error;
pub mod event;
pub mod heartbeat;

use std::{sync::Arc, time::Duration};

use streamhub_common::types::{ServerId, now_ms};
use streamhub_config::ShardRange;
use streamhub_metrics::{counter, store as store_metrics};
use streamhub_store::StoreGateway;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use {
    channel::BusChannel,
    error::{Error, Result},
    event::{BusEnvelope, BusEvent},
    heartbeat::{ACTIVE_WINDOW_SECS, ActiveServerTracker, HEARTBEAT_INTERVAL_SECS},
};

/// Cross-server event bus bound to one instance's identity.
pub struct Bus {
    store: Arc<StoreGateway>,
    server_id: ServerId,
    pub active_servers: Arc<ActiveServerTracker>,
}

impl Bus {
    pub fn new(store: Arc<StoreGateway>, server_id: ServerId) -> Self {
        Self {
            store,
            server_id,
            active_servers: Arc::new(ActiveServerTracker::new()),
        }
    }

    /// Publish an event on its channel, stamped with this instance's id and
    /// the current time. Best-effort: publish failures are logged, not
    /// fatal — the local in-memory state remains authoritative (spec §4.3
    /// failure semantics).
    pub async fn publish(&self, channel: BusChannel, event: BusEvent) {
        let envelope = BusEnvelope {
            server_id: self.server_id.clone(),
            timestamp: now_ms(),
            event,
        };
        let topic = channel.topic("streamhub");
        match self.store.publish(&topic, &envelope).await {
            Ok(_) => counter!(store_metrics::BUS_EVENTS_PUBLISHED_TOTAL).increment(1),
            Err(error) => warn!(%error, topic, "bus publish failed, local state remains authoritative"),
        }
    }

    /// Subscribe to one channel, receiving events from every other instance.
    /// Events published by this instance are discarded (echo suppression).
    pub fn subscribe(&self, channel: BusChannel) -> mpsc::UnboundedReceiver<BusEvent> {
        let topic = channel.topic("streamhub");
        let mut raw = self.store.subscribe(topic);
        let (tx, rx) = mpsc::unbounded_channel();
        let self_id = self.server_id.clone();

        tokio::spawn(async move {
            while let Some(msg) = raw.recv().await {
                let envelope: BusEnvelope = match serde_json::from_slice(&msg.payload) {
                    Ok(e) => e,
                    Err(error) => {
                        debug!(%error, "dropping undecodable bus envelope");
                        continue;
                    },
                };
                if envelope.server_id == self_id {
                    counter!(store_metrics::BUS_EVENTS_SUPPRESSED_TOTAL).increment(1);
                    continue;
                }
                counter!(store_metrics::BUS_EVENTS_RECEIVED_TOTAL).increment(1);
                if tx.send(envelope.event).is_err() {
                    return;
                }
            }
        });

        rx
    }

    /// Publish a heartbeat every [`HEARTBEAT_INTERVAL_SECS`] and record our
    /// own range locally, so a single-instance deployment still resolves
    /// `active_servers()` to itself.
    pub fn spawn_heartbeat(self: &Arc<Self>, owned_range: ShardRange) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        this.active_servers
            .record_heartbeat(this.server_id.clone(), owned_range);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
            loop {
                interval.tick().await;
                this.publish(
                    BusChannel::HealthChecks,
                    BusEvent::Heartbeat {
                        server_id: this.server_id.clone(),
                        shard_start: owned_range.start,
                        shard_end: owned_range.end,
                    },
                )
                .await;
                this.active_servers.prune();
            }
        })
    }

    /// Feed received heartbeats into the active-server tracker. Call this
    /// on events coming out of [`Self::subscribe`]`(BusChannel::HealthChecks)`.
    pub fn observe(&self, event: &BusEvent) {
        if let BusEvent::Heartbeat { server_id, shard_start, shard_end } = event {
            self.active_servers.record_heartbeat(
                server_id.clone(),
                ShardRange { start: *shard_start, end: *shard_end },
            );
        }
    }
}
