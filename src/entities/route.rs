use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// meters
    pub distance: f64,
    /// seconds
    pub duration: f64,
    pub geometry: Vec<Geometry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub coordinates: Vec<Coordinates>,
}

impl Route {
    pub fn new(distance: f64, duration: f64, coordinates: Vec<Coordinates>) -> Self {
        Self {
            distance,
            duration,
            geometry: vec![Geometry { coordinates }],
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }
}
