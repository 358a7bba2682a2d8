pub mod middleware;
pub mod routes;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::geo::{RoadDistanceProvider, UpstreamGeocoder};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub geocoder: Arc<UpstreamGeocoder>,
    pub matrix: Arc<dyn RoadDistanceProvider>,
}
