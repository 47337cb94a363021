use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use counter_client::ShardClientPool;
use counter_common::ServiceConfig;
use counter_core::CounterService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    info!(shards = config.shards.len(), bind = %config.server_bind_addr, "starting counter service");

    let router = ShardClientPool::new(
        &config.shards,
        config.virtual_nodes,
        config.shard_pool_max_conns,
        config.shard_call_timeout,
    )?;

    let service = Arc::new(CounterService::new(
        Arc::new(router),
        config.cache_ttl,
        config.flush_interval,
    ));
    service.start_background_flusher();

    let app = counter_server::build_router(service);
    let listener = tokio::net::TcpListener::bind(&config.server_bind_addr).await?;
    info!(addr = %config.server_bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
