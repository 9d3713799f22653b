pub mod osrm;

use async_trait::async_trait;

use crate::entities::{Coordinates, Route};
use crate::error::Error;

pub use osrm::OsrmClient;

/// Turns two points into a drivable route. Implementations never retry.
#[async_trait]
pub trait RoutingGateway: Send + Sync {
    async fn get_route(
        &self,
        pickup: &Coordinates,
        destination: &Coordinates,
    ) -> Result<Route, Error>;
}
