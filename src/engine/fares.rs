use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::entities::{Package, RideFare, Route};

const FLAT_BASE_FEE: f64 = 2.00;
const DEFAULT_QUOTE_WINDOW_SECS: i64 = 5 * 60;

/// Prices a route for every vehicle package. Pure apart from the clock and
/// the generated fare ids.
#[derive(Clone, Debug)]
pub struct FareEngine {
    rates_per_km: Vec<(Package, f64)>,
    base_fee: f64,
    quote_window: Duration,
}

impl Default for FareEngine {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_QUOTE_WINDOW_SECS))
    }
}

impl FareEngine {
    pub fn new(quote_window: Duration) -> Self {
        Self {
            rates_per_km: vec![
                (Package::Sedan, 2.50),
                (Package::Suv, 3.00),
                (Package::Van, 3.50),
                (Package::Luxury, 5.00),
            ],
            base_fee: FLAT_BASE_FEE,
            quote_window,
        }
    }

    pub fn quote_window(&self) -> Duration {
        self.quote_window
    }

    pub fn compute_fares(&self, route: &Route) -> Vec<RideFare> {
        self.compute_fares_at(route, Utc::now())
    }

    #[tracing::instrument(skip(self, route), fields(distance = route.distance))]
    pub fn compute_fares_at(&self, route: &Route, now: DateTime<Utc>) -> Vec<RideFare> {
        let expires_at = now + self.quote_window;
        let distance_km = route.distance_km();

        self.rates_per_km
            .iter()
            .map(|(package, rate)| {
                let base_price = rate * distance_km + self.base_fee;

                RideFare {
                    id: Uuid::new_v4(),
                    package: *package,
                    base_price,
                    total_price_in_cents: (base_price * 100.0).round() as i64,
                    expires_at,
                    route: route.clone(),
                }
            })
            .collect()
    }
}

#[test]
fn prices_every_package_by_distance() {
    let engine = FareEngine::default();
    let route = Route::new(7300.0, 900.0, vec![]);

    let fares = engine.compute_fares(&route);

    let expected = [
        (Package::Sedan, 2.50),
        (Package::Suv, 3.00),
        (Package::Van, 3.50),
        (Package::Luxury, 5.00),
    ];

    assert_eq!(fares.len(), expected.len());
    for (fare, (package, rate)) in fares.iter().zip(expected) {
        assert_eq!(fare.package, package);
        assert!((fare.base_price - (rate * 7.3 + 2.0)).abs() < 1e-9);
        assert_eq!(fare.route, route);
    }
}

#[test]
fn one_call_shares_expiry_and_uses_unique_ids() {
    use std::collections::HashSet;

    let engine = FareEngine::default();
    let now = Utc::now();

    let fares = engine.compute_fares_at(&Route::new(1234.0, 60.0, vec![]), now);

    let ids: HashSet<Uuid> = fares.iter().map(|fare| fare.id).collect();
    assert_eq!(ids.len(), Package::ALL.len());
    assert!(fares
        .iter()
        .all(|fare| fare.expires_at == now + Duration::minutes(5)));
}

#[test]
fn five_kilometers_in_a_sedan() {
    let fares = FareEngine::default().compute_fares(&Route::new(5000.0, 600.0, vec![]));

    let cents: Vec<i64> = fares.iter().map(|fare| fare.total_price_in_cents).collect();

    assert_eq!(cents, vec![1450, 1700, 1950, 2700]);
}

#[test]
fn zero_distance_costs_the_flat_fee() {
    let fares = FareEngine::default().compute_fares(&Route::new(0.0, 0.0, vec![]));

    assert!(fares.iter().all(|fare| fare.base_price == 2.0));
    assert!(fares.iter().all(|fare| fare.total_price_in_cents == 200));
}
