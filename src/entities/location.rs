use serde::{Deserialize, Serialize};

use crate::error::Error;

/// WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::invalid_input_error(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }

        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::invalid_input_error(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }

        Ok(())
    }
}

#[test]
fn validate_rejects_out_of_range_coordinates() {
    assert!(Coordinates::new(37.7749, -122.4194).validate().is_ok());
    assert!(Coordinates::new(90.0, 180.0).validate().is_ok());
    assert!(Coordinates::new(90.1, 0.0)
        .validate()
        .unwrap_err()
        .is_invalid_input_error());
    assert!(Coordinates::new(0.0, -180.5).validate().is_err());
    assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
    assert!(Coordinates::new(0.0, f64::INFINITY).validate().is_err());
}
