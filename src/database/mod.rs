pub mod current_user_repo;
pub mod friend_repo;
pub mod profile_repo;
pub mod session_repo;
pub mod session_request_repo;
pub mod user_repo;
