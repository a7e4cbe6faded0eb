pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod response;
pub mod rest;
pub mod store;

use std::sync::Arc;

use auth::{SessionIssuer, TokenCodec};
use config::{AuthConfig, TokenLifetimes};
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenCodec>,
    pub lifetimes: TokenLifetimes,
}

impl AppState {
    pub fn new(store: Store, auth: &AuthConfig) -> Self {
        Self {
            store,
            tokens: Arc::new(TokenCodec::from_config(auth)),
            lifetimes: auth.lifetimes,
        }
    }

    pub fn sessions(&self) -> SessionIssuer<'_, Store> {
        SessionIssuer::new(&self.store, &self.tokens, self.lifetimes)
    }
}
