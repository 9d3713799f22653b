mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{Trip, TripStatus};
use crate::error::Error;

pub use memory::MemoryTripStore;
pub use postgres::{PgPool, PgTripStore};

/// Durable home of trip records.
///
/// A read issued after a successful write observes that write.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn create(&self, trip: &Trip) -> Result<(), Error>;

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Trip>, Error>;

    /// Full replace. Refreshes `updated_at`.
    async fn update(&self, trip: &Trip) -> Result<(), Error>;

    /// Refreshes `updated_at` along with the status.
    async fn update_status(&self, id: &Uuid, status: TripStatus) -> Result<(), Error>;

    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Trip>, Error>;
}
