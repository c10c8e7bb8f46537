//! Typed façade over a distributed KV store with pub/sub (spec §4.1).
//!
//! Grounded in the pack's Redis pub/sub client: a dedicated multiplexed
//! connection for commands/publishing, a separate `PubSub` connection for
//! subscriptions (a subscribed connection cannot issue other commands), a
//! periodic health ping, and capped exponential-backoff reconnection.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::StreamExt;
use redis::{AsyncCommands, Client as RedisClient, aio::MultiplexedConnection};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::{
    codec,
    error::{Context, Result},
};

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;
const HEALTH_CHECK_INTERVAL_SECS: u64 = 10;
const COMMAND_TIMEOUT_SECS: u64 = 5;

/// A message received on a subscribed channel or pattern.
#[derive(Debug, Clone)]
pub struct StoreMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

pub struct StoreGateway {
    client: RedisClient,
    prefix: String,
    command_conn: Mutex<Option<MultiplexedConnection>>,
    healthy: Arc<AtomicBool>,
}

impl StoreGateway {
    /// `prefix` namespaces every key so the service can be bulk-cleared
    /// without disturbing co-tenant applications (spec §4.1).
    pub fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = RedisClient::open(redis_url).context("opening redis client")?;
        Ok(Self {
            client,
            prefix: prefix.into(),
            command_conn: Mutex::new(None),
            healthy: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.command_conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = tokio::time::timeout(
            Duration::from_secs(COMMAND_TIMEOUT_SECS),
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| crate::error::Error::BackendUnavailable("connect timed out".to_string()))??;
        *guard = Some(conn.clone());
        self.healthy.store(true, Ordering::Relaxed);
        Ok(conn)
    }

    async fn invalidate_conn(&self) {
        *self.command_conn.lock().await = None;
        self.healthy.store(false, Ordering::Relaxed);
    }

    /// Run a command, dropping the cached connection and reporting unhealthy
    /// on failure so the next call reconnects from scratch.
    async fn with_conn<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = std::result::Result<T, redis::RedisError>>,
    {
        let conn = self.conn().await?;
        match f(conn).await {
            Ok(v) => Ok(v),
            Err(e) => {
                self.invalidate_conn().await;
                Err(e.into())
            },
        }
    }

    /// Spawn a background task pinging Redis every 10s and flipping
    /// [`Self::is_healthy`] on repeated failure (spec §4.1).
    pub fn spawn_health_check(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
            loop {
                interval.tick().await;
                let result = this.with_conn(|mut c| async move { redis::cmd("PING").query_async::<String>(&mut c).await }).await;
                match result {
                    Ok(_) => this.healthy.store(true, Ordering::Relaxed),
                    Err(error) => {
                        warn!(%error, "store health ping failed");
                        this.healthy.store(false, Ordering::Relaxed);
                    },
                }
            }
        })
    }

    // ── KV ───────────────────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = self.namespaced(key);
        let raw: Option<Vec<u8>> = self
            .with_conn(|mut c| async move { c.get(&key).await })
            .await?;
        raw.map(|bytes| codec::decode(&bytes)).transpose()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let key = self.namespaced(key);
        let bytes = codec::encode(value)?;
        match ttl {
            Some(ttl) => {
                self.with_conn(|mut c| async move { c.set_ex::<_, _, ()>(&key, bytes, ttl.as_secs().max(1)).await })
                    .await
            },
            None => {
                self.with_conn(|mut c| async move { c.set::<_, _, ()>(&key, bytes).await })
                    .await
            },
        }
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.del::<_, ()>(&key).await })
            .await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.expire::<_, ()>(&key, ttl.as_secs().max(1) as i64).await })
            .await
    }

    // ── Hash ─────────────────────────────────────────────────────────────

    pub async fn hash_set<T: Serialize>(&self, key: &str, field: &str, value: &T) -> Result<()> {
        let key = self.namespaced(key);
        let bytes = codec::encode(value)?;
        self.with_conn(|mut c| async move { c.hset::<_, _, _, ()>(&key, field, bytes).await })
            .await
    }

    pub async fn hash_get<T: DeserializeOwned>(&self, key: &str, field: &str) -> Result<Option<T>> {
        let key = self.namespaced(key);
        let raw: Option<Vec<u8>> = self
            .with_conn(|mut c| async move { c.hget(&key, field).await })
            .await?;
        raw.map(|bytes| codec::decode(&bytes)).transpose()
    }

    pub async fn hash_get_all<T: DeserializeOwned>(&self, key: &str) -> Result<HashMap<String, T>> {
        let key = self.namespaced(key);
        let raw: HashMap<String, Vec<u8>> = self
            .with_conn(|mut c| async move { c.hgetall(&key).await })
            .await?;
        raw.into_iter()
            .map(|(field, bytes)| codec::decode(&bytes).map(|v| (field, v)))
            .collect()
    }

    pub async fn hash_del(&self, key: &str, field: &str) -> Result<()> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.hdel::<_, _, ()>(&key, field).await })
            .await
    }

    // ── Set ──────────────────────────────────────────────────────────────

    pub async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.sadd::<_, _, ()>(&key, member).await })
            .await
    }

    pub async fn set_rem(&self, key: &str, member: &str) -> Result<()> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.srem::<_, _, ()>(&key, member).await })
            .await
    }

    pub async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.smembers(&key).await })
            .await
    }

    pub async fn set_card(&self, key: &str) -> Result<usize> {
        let key = self.namespaced(key);
        self.with_conn(|mut c| async move { c.scard(&key).await })
            .await
    }

    // ── Pub/Sub ──────────────────────────────────────────────────────────

    pub async fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<usize> {
        let bytes = codec::encode(payload)?;
        self.with_conn(|mut c| async move { c.publish(channel, bytes).await })
            .await
    }

    /// Subscribe to a fixed channel, returning a receiver fed by a
    /// reconnecting background task (capped exponential backoff, mirroring
    /// the pack's Redis pub/sub subscriber loop).
    pub fn subscribe(&self, channel: impl Into<String>) -> mpsc::UnboundedReceiver<StoreMessage> {
        self.spawn_subscriber(SubscribeTarget::Channel(channel.into()))
    }

    pub fn psubscribe(&self, pattern: impl Into<String>) -> mpsc::UnboundedReceiver<StoreMessage> {
        self.spawn_subscriber(SubscribeTarget::Pattern(pattern.into()))
    }

    fn spawn_subscriber(&self, target: SubscribeTarget) -> mpsc::UnboundedReceiver<StoreMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);
            loop {
                match run_subscriber_once(&client, &target, &tx).await {
                    Ok(()) => {
                        info!(target = ?target, "store subscriber channel closed by caller");
                        return;
                    },
                    Err(error) => {
                        warn!(%error, backoff_secs = backoff.as_secs(), "store subscriber disconnected, retrying");
                    },
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
            }
        });

        rx
    }
}

#[derive(Debug, Clone)]
enum SubscribeTarget {
    Channel(String),
    Pattern(String),
}

async fn run_subscriber_once(
    client: &RedisClient,
    target: &SubscribeTarget,
    tx: &mpsc::UnboundedSender<StoreMessage>,
) -> Result<()> {
    let mut pubsub = tokio::time::timeout(
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
        client.get_async_pubsub(),
    )
    .await
    .map_err(|_| crate::error::Error::BackendUnavailable("pubsub connect timed out".to_string()))??;

    match target {
        SubscribeTarget::Channel(c) => pubsub.subscribe(c).await?,
        SubscribeTarget::Pattern(p) => pubsub.psubscribe(p).await?,
    }

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let payload: Vec<u8> = match msg.get_payload() {
            Ok(p) => p,
            Err(error) => {
                debug!(%error, channel, "dropping undecodable store message");
                continue;
            },
        };
        if tx.send(StoreMessage { channel, payload }).is_err() {
            return Ok(()); // receiver dropped, stop subscribing
        }
    }

    Err(crate::error::Error::BackendUnavailable(
        "pubsub stream ended".to_string(),
    ))
}
