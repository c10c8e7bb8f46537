//! Router assembly and the process entry point: builds the middleware stack,
//! wires every domain service into `GatewayState`, and serves both the
//! WebSocket upgrade and the HTTP surface (spec §6.3).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use streamhub_batcher::Batcher;
use streamhub_bus::Bus;
use streamhub_cache::Cache;
use streamhub_chat::RoomChatService;
use streamhub_config::StreamhubConfig;
use streamhub_metrics::{MetricsRecorderConfig, init_metrics};
use streamhub_ratelimit::RateLimiter;
use streamhub_rooms::RoomManager;
use streamhub_routing::ShardRouter;
use streamhub_sessions::SessionRegistry;
use streamhub_signaling::SignalingRelay;
use streamhub_store::StoreGateway;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::dispatch;
use crate::error::{Context, Result};
use crate::state::GatewayState;
use crate::{http, tick, ws};

pub async fn run(config: StreamhubConfig) -> Result<()> {
    let metrics = init_metrics(MetricsRecorderConfig { enabled: true, global_labels: vec![("server_id".into(), config.server_id.clone())] })
        .map_err(|error| crate::error::Error::Message(error.to_string()))?;

    let store = Arc::new(StoreGateway::new(&config.store_urls[0], "streamhub").context("connecting to store backend")?);
    store.spawn_health_check();

    let bus = Arc::new(Bus::new(Arc::clone(&store), config.server_id.clone()));
    bus.spawn_heartbeat(config.room_shard_range);

    let sessions = Arc::new(SessionRegistry::new());
    let router = Arc::new(ShardRouter::new(config.room_shard_range, config.shard_count));
    let rooms = Arc::new(RoomManager::new(Arc::clone(&store), Arc::clone(&bus)));
    let signaling = Arc::new(SignalingRelay::new(Arc::clone(&rooms)));
    let cache = Arc::new(Cache::new(Arc::clone(&store)));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), &config.throttle));
    let chat: Arc<dyn streamhub_chat::ChatService> = Arc::new(RoomChatService::new(Arc::clone(&rooms), Arc::clone(&bus), Arc::clone(&cache)));
    let batcher = Batcher::new(dispatch::batch_sink(Arc::clone(&sessions)));

    let state = Arc::new(GatewayState::new(
        Arc::new(config.clone()),
        sessions,
        router,
        rooms,
        signaling,
        batcher,
        cache,
        bus,
        limiter,
        chat,
        Arc::new(metrics),
    ));

    tick::spawn_room_tick(Arc::clone(&state));
    tick::spawn_throttle_sampler(Arc::clone(&state));

    let app = build_router(Arc::clone(&state));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, server_id = %state.config.server_id, "streamhub-gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding listener on {addr}"))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/health", get(http::health))
        .route("/api/rooms", get(http::rooms))
        .route("/metrics", get(http::metrics))
        .route("/rooms/{room_id}/rtp-capabilities", get(http::rtp_capabilities))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
}

async fn ws_upgrade(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws::handle_connection(socket, state, remote_addr))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("streamhub-gateway: shutdown signal received");
}
