//! Two background loops: the room-manager tick (spec §4.3, pending-approval
//! timeouts and empty-room GC) and the adaptive-throttle CPU/memory sampler
//! that flips the rate limiter into degraded mode (spec §4.8).

use std::sync::Arc;
use std::time::Duration;

use streamhub_protocol::TICK_INTERVAL_MS;
use sysinfo::System;

use crate::dispatch;
use crate::state::GatewayState;

pub fn spawn_room_tick(state: Arc<GatewayState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
        loop {
            interval.tick().await;
            for (_room_id, notify) in state.rooms.tick() {
                dispatch::fanout(&state, notify);
            }
        }
    })
}

pub fn spawn_throttle_sampler(state: Arc<GatewayState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let throttle = &state.config.throttle;
        let mut interval = tokio::time::interval(Duration::from_secs(throttle.check_interval_secs));
        let mut system = System::new_all();
        loop {
            interval.tick().await;
            system.refresh_cpu_usage();
            system.refresh_memory();

            let cpu_load = system.global_cpu_usage() / 100.0;
            let memory_load = if system.total_memory() == 0 {
                0.0
            } else {
                system.used_memory() as f32 / system.total_memory() as f32
            };

            let degraded = cpu_load >= state.config.throttle.cpu_high_watermark || memory_load >= state.config.throttle.memory_high_watermark;
            state.limiter.set_degraded(degraded);
            if degraded {
                tracing::warn!(cpu_load, memory_load, "gateway: entering degraded rate-limit mode");
            }
        }
    })
}
