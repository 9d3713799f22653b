use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Driver, RideFare, Route};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub status: Status,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_fare: Option<RideFare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Created,
    DriverAssigned,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::DriverAssigned => "driver_assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Only `Created -> DriverAssigned` is driven by an operation today; the
    /// remaining edges are the vocabulary later operations must respect.
    pub fn can_transition_to(&self, next: Status) -> bool {
        match (self, next) {
            (Self::Pending, Self::Created)
            | (Self::Created, Self::DriverAssigned)
            | (Self::DriverAssigned, Self::InProgress)
            | (Self::InProgress, Self::Completed) => true,
            (current, Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl Trip {
    pub fn new(user_id: String, route: Route, selected_fare: RideFare) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id,
            status: Status::Created,
            route,
            selected_fare: Some(selected_fare),
            driver: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[test]
fn status_transitions() {
    use Status::*;

    assert!(Pending.can_transition_to(Created));
    assert!(Created.can_transition_to(DriverAssigned));
    assert!(DriverAssigned.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Completed));

    for status in [Pending, Created, DriverAssigned, InProgress] {
        assert!(status.can_transition_to(Cancelled));
    }

    assert!(!Completed.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Cancelled));
    assert!(!Created.can_transition_to(Completed));
    assert!(!DriverAssigned.can_transition_to(Created));
}

#[test]
fn trip_json_shape() {
    use crate::entities::{Package, Route};

    let route = Route::new(1000.0, 120.0, vec![]);
    let fare = RideFare {
        id: Uuid::new_v4(),
        package: Package::Van,
        base_price: 5.5,
        total_price_in_cents: 550,
        expires_at: Utc::now(),
        route: route.clone(),
    };
    let trip = Trip::new("rider-1".into(), route, fare);

    let value = serde_json::to_value(&trip).unwrap();

    assert_eq!(value["userID"], "rider-1");
    assert_eq!(value["status"], "created");
    assert_eq!(value["selectedFare"]["packageSlug"], "van");
    assert!(value.get("driver").is_none());

    let decoded: Trip = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, trip);
}
