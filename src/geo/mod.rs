pub mod distance;
pub mod geocode;

pub use distance::{
    great_circle_miles, MatrixClient, MatrixError, RoadDistance, RoadDistanceProvider,
};
pub use geocode::{Geocode, GeocodeResult, UpstreamGeocoder};
