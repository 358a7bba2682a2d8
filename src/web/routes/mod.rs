pub mod buddies;
pub mod chat_api;
pub mod friends;
pub mod location;
pub mod profile;
pub mod sessions;
