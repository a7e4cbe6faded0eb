pub mod story;
pub mod user;
