mod fares;
mod quotes;
mod trip_api;

use std::sync::Arc;

use crate::{
    api::{TripPreview, API},
    db::TripStore,
    entities::Coordinates,
    error::Error,
    events::{EventChannel, TripEvents},
    external::RoutingGateway,
};

pub use fares::FareEngine;
pub use quotes::QuoteBook;

/// Trip orchestrator. Holds no durable state of its own; every collaborator
/// is injected.
pub struct Engine {
    routing: Arc<dyn RoutingGateway>,
    fares: FareEngine,
    store: Arc<dyn TripStore>,
    events: TripEvents,
    quotes: QuoteBook,
}

impl Engine {
    pub fn new(
        routing: Arc<dyn RoutingGateway>,
        fares: FareEngine,
        store: Arc<dyn TripStore>,
        channel: Arc<dyn EventChannel>,
    ) -> Self {
        let quotes = QuoteBook::new(fares.quote_window());

        Self {
            routing,
            fares,
            store,
            events: TripEvents::new(channel),
            quotes,
        }
    }

    /// Route then fares, nothing recorded.
    #[tracing::instrument(skip(self))]
    async fn price_route(
        &self,
        pickup: &Coordinates,
        destination: &Coordinates,
    ) -> Result<TripPreview, Error> {
        pickup.validate()?;
        destination.validate()?;

        let route = self.routing.get_route(pickup, destination).await?;

        tracing::info!(
            "route fetched: distance={}m duration={}s",
            route.distance,
            route.duration
        );

        let ride_fares = self.fares.compute_fares(&route);

        tracing::info!("computed {} fares", ride_fares.len());

        Ok(TripPreview { route, ride_fares })
    }
}

impl API for Engine {}
