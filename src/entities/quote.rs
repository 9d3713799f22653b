use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Coordinates, Route};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Package {
    Sedan,
    Suv,
    Van,
    Luxury,
}

impl Package {
    pub const ALL: [Package; 4] = [Package::Sedan, Package::Suv, Package::Van, Package::Luxury];
}

/// A priced ride option. Until it is attached to a trip it is only a quote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideFare {
    pub id: Uuid,
    #[serde(rename = "packageSlug")]
    pub package: Package,
    pub base_price: f64,
    pub total_price_in_cents: i64,
    pub expires_at: DateTime<Utc>,
    pub route: Route,
}

impl RideFare {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A fare as it was shown to a rider, kept server-side so the rider can
/// later commit to it by id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub user_id: String,
    pub pickup: Coordinates,
    pub destination: Coordinates,
    pub fare: RideFare,
}

impl Quote {
    pub fn was_issued_for(
        &self,
        user_id: &str,
        pickup: &Coordinates,
        destination: &Coordinates,
    ) -> bool {
        self.user_id == user_id && &self.pickup == pickup && &self.destination == destination
    }
}

#[test]
fn fare_serializes_with_package_slug() {
    let fare = RideFare {
        id: Uuid::nil(),
        package: Package::Suv,
        base_price: 17.0,
        total_price_in_cents: 1700,
        expires_at: Utc::now(),
        route: Route::new(5000.0, 600.0, vec![]),
    };

    let value = serde_json::to_value(&fare).unwrap();

    assert_eq!(value["packageSlug"], "suv");
    assert_eq!(value["totalPriceInCents"], 1700);
    assert!(value.get("expiresAt").is_some());
}
