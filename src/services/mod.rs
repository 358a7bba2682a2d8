pub mod buddy_search_service;
pub mod friendship_service;
pub mod geo_backfill_service;
pub mod messaging_service;
pub mod profile_service;
pub mod session_search_service;
pub mod session_service;
