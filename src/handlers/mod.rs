pub mod auth;
pub mod story;
