use std::sync::Arc;

use dotenv::dotenv;
use tokio::sync::watch;

use trip_service::api::DynAPI;
use trip_service::config::Config;
use trip_service::db::{MemoryTripStore, PgPool, PgTripStore, TripStore};
use trip_service::engine::{Engine, FareEngine};
use trip_service::error::Error;
use trip_service::events::{DriverResponseConsumer, EventChannel, LocalBroker};
use trip_service::external::OsrmClient;
use trip_service::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let store: Arc<dyn TripStore> = match &config.database_url {
        Some(url) => {
            let PgPool(pool) = PgPool::new(url, config.database_max_connections).await?;
            Arc::new(PgTripStore::new(pool).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, trips are kept in memory");
            Arc::new(MemoryTripStore::new())
        }
    };

    let quote_window = chrono::Duration::from_std(config.quote_window)
        .map_err(|err| Error::config_error(err.to_string()))?;

    let broker: Arc<dyn EventChannel> = Arc::new(LocalBroker::new());

    let api = Arc::new(Engine::new(
        Arc::new(OsrmClient::new(config.osrm_url.clone())),
        FareEngine::new(quote_window),
        store,
        broker.clone(),
    )) as DynAPI;

    let (stop, stopped) = watch::channel(false);

    let consumer = DriverResponseConsumer::new(api.clone(), broker, config.max_delivery_attempts);
    let consumer = tokio::spawn(consumer.run(shutdown_signal(stopped)));

    let served = serve(api, config.http_addr, async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", err);
        }

        tracing::info!("shutting down");
        stop.send(true).ok();
    })
    .await;

    match consumer.await {
        Ok(result) => result?,
        Err(err) => tracing::error!("driver response consumer panicked: {}", err),
    }

    served
}

async fn shutdown_signal(mut stopped: watch::Receiver<bool>) {
    while !*stopped.borrow() {
        if stopped.changed().await.is_err() {
            break;
        }
    }
}
