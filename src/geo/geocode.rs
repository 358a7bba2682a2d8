use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::config::GeoConfig;

#[derive(Debug, Serialize, Clone)]
pub struct GeocodeResult {
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Address-to-coordinates lookup. Failure is expressed as `None`; callers
/// must treat it as "leave coordinates null", never as a fatal error.
#[async_trait]
pub trait Geocode: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<(f64, f64)>;
}

#[derive(Debug, Deserialize)]
struct Geo {
    lat: Option<f64>,
    lng: Option<f64>,
}

// Upstreams disagree on coordinate field spellings; accept the common ones.
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    name: Option<String>,
    description: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(rename = "_geo")]
    geo: Option<Geo>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Option<Vec<GeocodeHit>>,
}

pub struct UpstreamGeocoder {
    client: reqwest::Client,
    cfg: GeoConfig,
}

impl UpstreamGeocoder {
    pub fn new(cfg: GeoConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, cfg }
    }

    pub async fn search(&self, q: &str, limit: usize) -> Result<Vec<GeocodeResult>, ()> {
        let q = q.trim();
        if q.len() < 2 {
            return Ok(Vec::new());
        }

        let limit = limit.clamp(1, 20);
        let url = format!("{}/search", self.cfg.geocoder_url.trim_end_matches('/'));

        let mut req = self
            .client
            .get(&url)
            .query(&[("q", q), ("limit", &limit.to_string())]);
        if let Some(key) = self.cfg.geocoder_api_key.as_deref() {
            req = req.header("x-api-key", key);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Geocoder upstream unreachable: {}", e);
                return Err(());
            }
        };

        if !resp.status().is_success() {
            warn!("Geocoder upstream non-OK: {}", resp.status());
            return Err(());
        }

        let parsed: SearchResponse = match resp.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Geocoder upstream JSON parse failed: {}", e);
                return Err(());
            }
        };

        let hits = parsed.hits.unwrap_or_default();
        let results = hits
            .into_iter()
            .filter_map(|hit| {
                let geo_lat = hit.geo.as_ref().and_then(|g| g.lat);
                let geo_lng = hit.geo.as_ref().and_then(|g| g.lng);
                let lat = geo_lat.or(hit.lat).or(hit.latitude)?;
                let lng = geo_lng.or(hit.lon).or(hit.longitude)?;

                Some(GeocodeResult {
                    name: hit.name.unwrap_or_default(),
                    description: hit.description.unwrap_or_default(),
                    latitude: lat,
                    longitude: lng,
                })
            })
            .collect::<Vec<_>>();

        Ok(results)
    }
}

#[async_trait]
impl Geocode for UpstreamGeocoder {
    async fn resolve(&self, address: &str) -> Option<(f64, f64)> {
        match self.search(address, 1).await {
            Ok(results) => results.first().map(|r| (r.latitude, r.longitude)),
            Err(()) => None,
        }
    }
}
