use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use std::env;

use studybuddy::config::GeoConfig;
use studybuddy::geo::UpstreamGeocoder;
use studybuddy::services::geo_backfill_service;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .expect("Cannot connect to DB");

    let limit: i64 = env::var("BACKFILL_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(500);

    let geocoder = UpstreamGeocoder::new(GeoConfig::from_env());

    match geo_backfill_service::backfill_missing_geo(&pool, &geocoder, limit).await {
        Ok(report) => {
            println!(
                "geo backfill: candidates={}, updated={}, skipped={}, failed={}",
                report.candidates, report.updated, report.skipped, report.failed
            );
        }
        Err(e) => {
            eprintln!("geo backfill failed: {}", e);
            std::process::exit(1);
        }
    }
}
