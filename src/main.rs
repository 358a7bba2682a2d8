use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use http::header::{HeaderValue, CACHE_CONTROL};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use studybuddy::config::GeoConfig;
use studybuddy::geo::{MatrixClient, UpstreamGeocoder};
use studybuddy::web::middleware::auth as auth_middleware;
use studybuddy::web::routes::{buddies, chat_api, friends, location, profile, sessions};
use studybuddy::web::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // 1. Start logging
    tracing_subscriber::fmt::init();

    // 2. Connect to the database
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    println!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .connect(&db_url)
        .await
        .expect("Cannot connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Cannot apply migrations");

    // 3. External geo providers, configured once and injected
    let geo_cfg = GeoConfig::from_env();
    let state = AppState {
        pool,
        geocoder: Arc::new(UpstreamGeocoder::new(geo_cfg.clone())),
        matrix: Arc::new(MatrixClient::new(geo_cfg)),
    };

    // 4. Protected routes under a single middleware layer
    let protected_routes = Router::new()
        .route("/buddies", get(buddies::buddy_search_handler))
        .route("/friends", get(friends::friends_overview_handler))
        .route(
            "/users/:user_id/friendship",
            post(friends::friendship_command_handler),
        )
        .route("/profile", get(profile::own_profile_handler).post(profile::edit_profile_handler))
        .route(
            "/sessions",
            get(sessions::session_browse_handler).post(sessions::create_session_handler),
        )
        .route("/sessions/friends", get(sessions::friends_sessions_handler))
        .route("/dashboard", get(sessions::tutor_dashboard_handler))
        .route("/sessions/:session_id", post(sessions::edit_session_handler))
        .route(
            "/sessions/:session_id/delete",
            post(sessions::delete_session_handler),
        )
        .route(
            "/sessions/:session_id/request",
            post(sessions::request_seat_handler),
        )
        .route(
            "/sessions/:session_id/requests",
            get(sessions::session_requests_handler),
        )
        .route("/requests/:request_id", post(sessions::seat_command_handler))
        .route("/api/location/search", get(location::search_locations))
        .route(
            "/api/chat/resolve-conversation",
            get(chat_api::resolve_conversation_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ));

    // 5. Assemble the application
    let app = Router::new()
        .merge(protected_routes)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .with_state(state);

    // 6. Start the server (with fallback port)
    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Cannot parse host/port");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!(
                "Could not bind {}: {}. Trying fallback {}:{}",
                addr,
                e,
                host,
                port + 1
            );
            let fallback: SocketAddr = format!("{}:{}", host, port + 1)
                .parse()
                .expect("Cannot parse fallback");
            tokio::net::TcpListener::bind(fallback)
                .await
                .expect("Cannot bind fallback port")
        }
    };

    let bound_addr = listener.local_addr().unwrap();
    println!("Server running on http://{}", bound_addr);

    axum::serve(listener, app).await.unwrap();
}
