use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ridepool_api::{app, AppState};
use ridepool_core::{CacheStore, Clock, SystemClock, UnitOfWorkFactory};
use ridepool_store::{app_config::Config, DbClient, RedisClient};
use ridepool_trips::{
    BookingWorkflow, ReviewListCache, ReviewService, TripService, TripStatusScheduler,
    TripStatusSweep,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool_api=debug,ridepool_trips=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Ridepool API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let uow: Arc<dyn UnitOfWorkFactory> = Arc::new(db.unit_of_work_factory());

    // Redis
    let redis: Arc<dyn CacheStore> = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .context("Failed to create Redis client")?,
    );

    let review_cache = ReviewListCache::new(
        redis,
        Duration::from_secs(config.review_cache.ttl_seconds),
        Duration::from_secs(config.review_cache.jitter_seconds),
    );

    let app_state = AppState {
        trips: Arc::new(TripService::new(uow.clone())),
        bookings: Arc::new(BookingWorkflow::new(uow.clone())),
        reviews: Arc::new(ReviewService::new(uow.clone(), review_cache)),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sweep = Arc::new(TripStatusSweep::new(uow, clock));
    let scheduler = TripStatusScheduler::new(sweep, config.scheduler.interval());
    scheduler.start();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
