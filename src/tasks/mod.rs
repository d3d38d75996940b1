//! Background tasks.
//!
//! Only idle-session eviction runs in the background; claim deadlines are
//! advisory and enforced by the host through `redraw`.
//! Call `spawn_all` once during startup.

use crate::config::RaffleConfig;
use crate::services::SessionRegistry;

/// Spawn all background tasks. Detaches via `tokio::spawn`; does not block.
pub fn spawn_all(registry: SessionRegistry, config: &RaffleConfig) {
    // 空闲场次清理（只移除内存实例，存储中的数据保留）
    {
        let max_idle = chrono::Duration::seconds(config.idle_eviction_secs);
        let interval = std::time::Duration::from_secs(config.eviction_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    log::info!(
                        "Evicted {evicted} idle sessions, {} still active",
                        registry.active_sessions().await
                    );
                }
            }
        });
    }
}
