use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

/// Driver profile as attached to an accepted trip. The profile itself is
/// owned by the driver side of the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    pub geohash: String,
    #[serde(rename = "profilePicture")]
    pub profile_picture_ref: String,
    pub car_plate: String,
}
