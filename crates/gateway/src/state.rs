//! Shared gateway runtime state (spec §4), wrapped in `Arc` for use across
//! connection tasks. Mirrors the teacher's `GatewayState` shape: one struct
//! bundling every domain service, cloned cheaply per request via `Arc`.

use std::sync::Arc;

use streamhub_batcher::Batcher;
use streamhub_bus::Bus;
use streamhub_cache::Cache;
use streamhub_chat::ChatService;
use streamhub_config::StreamhubConfig;
use streamhub_metrics::MetricsHandle;
use streamhub_ratelimit::RateLimiter;
use streamhub_rooms::RoomManager;
use streamhub_routing::ShardRouter;
use streamhub_sessions::SessionRegistry;
use streamhub_signaling::SignalingRelay;

/// Everything a connection handler or HTTP route needs. Cheap to clone —
/// every field is an `Arc`.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<StreamhubConfig>,
    pub sessions: Arc<SessionRegistry>,
    pub router: Arc<ShardRouter>,
    pub rooms: Arc<RoomManager>,
    pub signaling: Arc<SignalingRelay>,
    pub batcher: Arc<Batcher>,
    pub cache: Arc<Cache>,
    pub bus: Arc<Bus>,
    pub limiter: Arc<RateLimiter>,
    pub chat: Arc<dyn ChatService>,
    pub metrics: Arc<MetricsHandle>,
    pub version: &'static str,
    pub hostname: Arc<str>,
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<StreamhubConfig>,
        sessions: Arc<SessionRegistry>,
        router: Arc<ShardRouter>,
        rooms: Arc<RoomManager>,
        signaling: Arc<SignalingRelay>,
        batcher: Arc<Batcher>,
        cache: Arc<Cache>,
        bus: Arc<Bus>,
        limiter: Arc<RateLimiter>,
        chat: Arc<dyn ChatService>,
        metrics: Arc<MetricsHandle>,
    ) -> Self {
        let hostname = hostname_or_unknown();
        Self {
            config,
            sessions,
            router,
            rooms,
            signaling,
            batcher,
            cache,
            bus,
            limiter,
            chat,
            metrics,
            version: env!("CARGO_PKG_VERSION"),
            hostname,
        }
    }
}

fn hostname_or_unknown() -> Arc<str> {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()).into()
}
