use axum::extract::{Extension, Json, Path};
use axum_macros::debug_handler;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, TripPreview};
use crate::entities::{Coordinates, Trip};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct PreviewParams {
    #[serde(rename = "userID")]
    user_id: String,
    pickup: Coordinates,
    destination: Coordinates,
}

#[derive(Serialize, Deserialize)]
pub struct StartParams {
    #[serde(rename = "rideFareID")]
    ride_fare_id: Uuid,
    #[serde(rename = "userID")]
    user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    #[serde(rename = "tripID")]
    trip_id: Uuid,
}

#[debug_handler]
pub async fn preview(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<PreviewParams>,
) -> Result<Json<TripPreview>, Error> {
    let preview = api
        .preview_trip(params.user_id, params.pickup, params.destination)
        .await?;

    Ok(preview.into())
}

#[debug_handler]
pub async fn start(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<StartParams>,
) -> Result<Json<StartResponse>, Error> {
    let trip = api.start_trip(params.user_id, params.ride_fare_id).await?;

    Ok(StartResponse { trip_id: trip.id }.into())
}

#[debug_handler]
pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, Error> {
    let trip = api.find_trip(id).await?;

    Ok(trip.into())
}

#[debug_handler]
pub async fn find_by_user(
    Extension(api): Extension<DynAPI>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Trip>>, Error> {
    let trips = api.find_user_trips(user_id).await?;

    Ok(trips.into())
}
