use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{Coordinates, Quote, RideFare};

/// Server-side memory of the fares shown to riders, keyed by fare id.
///
/// Expired quotes are retained for `retention` past their expiry so that a
/// late selection is reported as expired rather than unknown.
pub struct QuoteBook {
    quotes: RwLock<HashMap<Uuid, Quote>>,
    retention: Duration,
}

impl QuoteBook {
    pub fn new(retention: Duration) -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
            retention,
        }
    }

    #[tracing::instrument(skip(self, fares), fields(count = fares.len()))]
    pub async fn record(
        &self,
        user_id: &str,
        pickup: Coordinates,
        destination: Coordinates,
        fares: &[RideFare],
    ) {
        let mut quotes = self.quotes.write().await;

        let cutoff = Utc::now() - self.retention;
        quotes.retain(|_, quote| quote.fare.expires_at > cutoff);

        for fare in fares {
            quotes.insert(
                fare.id,
                Quote {
                    user_id: user_id.to_string(),
                    pickup,
                    destination,
                    fare: fare.clone(),
                },
            );
        }
    }

    pub async fn find(&self, fare_id: &Uuid) -> Option<Quote> {
        self.quotes.read().await.get(fare_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.quotes.read().await.len()
    }
}

#[tokio::test]
async fn records_and_finds_quotes() {
    use crate::engine::FareEngine;
    use crate::entities::Route;

    let book = QuoteBook::new(Duration::minutes(5));
    let fares = FareEngine::default().compute_fares(&Route::new(2000.0, 300.0, vec![]));
    let pickup = Coordinates::new(1.0, 2.0);
    let destination = Coordinates::new(3.0, 4.0);

    book.record("rider-1", pickup, destination, &fares).await;

    let quote = book.find(&fares[2].id).await.unwrap();
    assert_eq!(quote.fare, fares[2]);
    assert!(quote.was_issued_for("rider-1", &pickup, &destination));
    assert!(!quote.was_issued_for("rider-2", &pickup, &destination));
    assert!(book.find(&Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn drops_quotes_past_retention() {
    use crate::engine::FareEngine;
    use crate::entities::Route;

    let book = QuoteBook::new(Duration::minutes(5));
    let route = Route::new(2000.0, 300.0, vec![]);
    let stale = FareEngine::default().compute_fares_at(&route, Utc::now() - Duration::hours(1));
    let fresh = FareEngine::default().compute_fares(&route);
    let here = Coordinates::new(0.0, 0.0);

    book.record("rider-1", here, here, &stale).await;
    assert_eq!(book.len().await, 4);

    // recording prunes anything expired for longer than the retention
    book.record("rider-1", here, here, &fresh).await;
    assert_eq!(book.len().await, 4);
    assert!(book.find(&stale[0].id).await.is_none());
    assert!(book.find(&fresh[0].id).await.is_some());
}
