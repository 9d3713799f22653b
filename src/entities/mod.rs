mod driver;
mod location;
mod quote;
mod route;
mod trip;

pub use driver::Driver;
pub use location::Coordinates;
pub use quote::{Package, Quote, RideFare};
pub use route::{Geometry, Route};
pub use trip::{Status as TripStatus, Trip};
