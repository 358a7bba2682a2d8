use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::config::GeoConfig;

const EARTH_RADIUS_MILES: f64 = 3958.8;
const METERS_PER_MILE: f64 = 1609.344;

/// Great-circle distance in miles (haversine). Cheap enough to run per
/// candidate; road distance is reserved for the ranked short list.
pub fn great_circle_miles(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlng = to_rad(lng2 - lng1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_MILES * c
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadDistance {
    pub distance_miles: f64,
    pub duration_minutes: f64,
    pub duration_in_traffic_minutes: Option<f64>,
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("distance matrix upstream failed: {0}")]
    Upstream(String),
}

/// Batch road-distance lookup. Destinations are keyed by caller-chosen ids;
/// unreachable or omitted destinations are simply absent from the result map.
#[async_trait]
pub trait RoadDistanceProvider: Send + Sync {
    async fn batch_road_distance(
        &self,
        origin: (f64, f64),
        destinations: &[(i64, f64, f64)],
        use_traffic: bool,
    ) -> Result<HashMap<i64, RoadDistance>, MatrixError>;
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
    duration_in_traffic: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    rows: Vec<MatrixRow>,
}

pub struct MatrixClient {
    client: reqwest::Client,
    cfg: GeoConfig,
}

impl MatrixClient {
    pub fn new(cfg: GeoConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, cfg }
    }

    async fn fetch_chunk(
        &self,
        origin: (f64, f64),
        chunk: &[(i64, f64, f64)],
        use_traffic: bool,
    ) -> Result<MatrixResponse, String> {
        let origins = format!("{},{}", origin.0, origin.1);
        let destinations = chunk
            .iter()
            .map(|(_, lat, lng)| format!("{},{}", lat, lng))
            .collect::<Vec<_>>()
            .join("|");

        let mut params: Vec<(&str, String)> = vec![
            ("origins", origins),
            ("destinations", destinations),
            ("units", "imperial".to_string()),
        ];
        if use_traffic {
            params.push(("departure_time", "now".to_string()));
        }
        if let Some(key) = self.cfg.matrix_api_key.as_deref() {
            params.push(("key", key.to_string()));
        }

        let resp = self
            .client
            .get(self.cfg.matrix_url.as_str())
            .query(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("non-OK status {}", resp.status()));
        }

        let body: MatrixResponse = resp.json().await.map_err(|e| e.to_string())?;
        if body.status != "OK" {
            return Err(format!("provider status {}", body.status));
        }
        Ok(body)
    }
}

// One origin per call, so the provider returns a single row whose elements
// line up with the destination order of the chunk.
fn collect_row(chunk: &[(i64, f64, f64)], body: &MatrixResponse, out: &mut HashMap<i64, RoadDistance>) {
    let Some(row) = body.rows.first() else {
        return;
    };
    for ((id, _, _), element) in chunk.iter().zip(row.elements.iter()) {
        if element.status != "OK" {
            continue;
        }
        let (Some(distance), Some(duration)) = (&element.distance, &element.duration) else {
            continue;
        };
        out.insert(
            *id,
            RoadDistance {
                distance_miles: distance.value / METERS_PER_MILE,
                duration_minutes: duration.value / 60.0,
                duration_in_traffic_minutes: element
                    .duration_in_traffic
                    .as_ref()
                    .map(|d| d.value / 60.0),
            },
        );
    }
}

#[async_trait]
impl RoadDistanceProvider for MatrixClient {
    async fn batch_road_distance(
        &self,
        origin: (f64, f64),
        destinations: &[(i64, f64, f64)],
        use_traffic: bool,
    ) -> Result<HashMap<i64, RoadDistance>, MatrixError> {
        if destinations.is_empty() {
            return Ok(HashMap::new());
        }

        let chunk_size = self.cfg.matrix_max_destinations.max(1);
        let mut out = HashMap::new();
        let mut failed_chunks = 0usize;
        let mut total_chunks = 0usize;
        let mut last_error = String::new();

        for chunk in destinations.chunks(chunk_size) {
            total_chunks += 1;
            match self.fetch_chunk(origin, chunk, use_traffic).await {
                Ok(body) => collect_row(chunk, &body, &mut out),
                Err(e) => {
                    // Partial failure: drop this chunk's candidates, keep going.
                    warn!("Distance matrix chunk failed ({} dests): {}", chunk.len(), e);
                    failed_chunks += 1;
                    last_error = e;
                }
            }
        }

        if failed_chunks == total_chunks {
            return Err(MatrixError::Upstream(last_error));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_symmetric_and_zero_at_identity() {
        let (a_lat, a_lng) = (33.7756, -84.3963);
        let (b_lat, b_lng) = (34.0522, -118.2437);

        assert_eq!(great_circle_miles(a_lat, a_lng, a_lat, a_lng), 0.0);
        let ab = great_circle_miles(a_lat, a_lng, b_lat, b_lng);
        let ba = great_circle_miles(b_lat, b_lng, a_lat, a_lng);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn haversine_matches_known_distances() {
        // Georgia Tech to downtown Atlanta: around two miles.
        let local = great_circle_miles(33.7756, -84.3963, 33.7490, -84.3880);
        assert!(local > 1.0 && local < 3.0, "got {local}");

        // Atlanta to Los Angeles: around 1940 miles.
        let cross_country = great_circle_miles(33.7756, -84.3963, 34.0522, -118.2437);
        assert!(
            cross_country > 1800.0 && cross_country < 2100.0,
            "got {cross_country}"
        );
    }

    #[test]
    fn collect_row_skips_non_ok_elements() {
        let chunk = vec![(1, 0.0, 0.0), (2, 0.0, 0.0), (3, 0.0, 0.0)];
        let body = MatrixResponse {
            status: "OK".to_string(),
            rows: vec![MatrixRow {
                elements: vec![
                    MatrixElement {
                        status: "OK".to_string(),
                        distance: Some(MatrixValue { value: 1609.344 }),
                        duration: Some(MatrixValue { value: 120.0 }),
                        duration_in_traffic: Some(MatrixValue { value: 180.0 }),
                    },
                    MatrixElement {
                        status: "ZERO_RESULTS".to_string(),
                        distance: None,
                        duration: None,
                        duration_in_traffic: None,
                    },
                    MatrixElement {
                        status: "OK".to_string(),
                        distance: Some(MatrixValue { value: 3218.688 }),
                        duration: Some(MatrixValue { value: 300.0 }),
                        duration_in_traffic: None,
                    },
                ],
            }],
        };

        let mut out = HashMap::new();
        collect_row(&chunk, &body, &mut out);

        assert_eq!(out.len(), 2);
        let first = &out[&1];
        assert!((first.distance_miles - 1.0).abs() < 1e-9);
        assert!((first.duration_minutes - 2.0).abs() < 1e-9);
        assert_eq!(first.duration_in_traffic_minutes, Some(3.0));
        // The unreachable destination is absent, not an error.
        assert!(!out.contains_key(&2));
        assert!((out[&3].distance_miles - 2.0).abs() < 1e-9);
    }
}
