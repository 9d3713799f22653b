use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{Coordinates, RideFare, Route, Trip};
use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPreview {
    pub route: Route,
    pub ride_fares: Vec<RideFare>,
}

#[async_trait]
pub trait TripAPI {
    /// Read-only quote: route plus one fare per package.
    async fn preview_trip(
        &self,
        user_id: String,
        pickup: Coordinates,
        destination: Coordinates,
    ) -> Result<TripPreview, Error>;

    async fn create_trip(
        &self,
        user_id: String,
        fare_id: Uuid,
        pickup: Coordinates,
        destination: Coordinates,
    ) -> Result<Trip, Error>;

    /// Creates a trip from a previously previewed fare, recovering the
    /// endpoints from the quote.
    async fn start_trip(&self, user_id: String, fare_id: Uuid) -> Result<Trip, Error>;

    async fn find_trip(&self, id: Uuid) -> Result<Trip, Error>;

    async fn find_user_trips(&self, user_id: String) -> Result<Vec<Trip>, Error>;
}

#[async_trait]
pub trait DriverResponseAPI {
    async fn handle_driver_response(
        &self,
        trip_id: Uuid,
        driver_id: String,
        accepted: bool,
    ) -> Result<(), Error>;
}

pub trait API: TripAPI + DriverResponseAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
