use std::env;
use std::time::Duration;

/// Provider endpoints and keys for the geo adapters. Read from env once at
/// startup and injected at construction, so the adapters carry no ambient
/// process state.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub geocoder_url: String,
    pub geocoder_api_key: Option<String>,
    pub matrix_url: String,
    pub matrix_api_key: Option<String>,
    /// Provider-imposed maximum destinations per matrix call.
    pub matrix_max_destinations: usize,
    pub request_timeout: Duration,
}

impl GeoConfig {
    pub fn from_env() -> Self {
        let timeout_secs: u64 = env::var("GEO_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            geocoder_url: env::var("GEOCODER_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            geocoder_api_key: env::var("GEOCODER_API_KEY").ok(),
            matrix_url: env::var("DISTANCE_MATRIX_API_URL").unwrap_or_else(|_| {
                "https://maps.googleapis.com/maps/api/distancematrix/json".to_string()
            }),
            matrix_api_key: env::var("DISTANCE_MATRIX_API_KEY").ok(),
            matrix_max_destinations: env::var("DISTANCE_MATRIX_MAX_DESTINATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
