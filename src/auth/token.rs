//! Signed, expiring claims carried by access and refresh tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account email.
    pub sub: String,
    /// User id. Tokens minted without one decode with an empty id.
    #[serde(default)]
    pub id: String,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is missing")]
    Missing,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("refusing to sign claims: {0}")]
    InvalidClaims(&'static str),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Encodes and decodes tokens under one shared secret and one HMAC algorithm.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        // Pinning `algorithms` to the single configured value makes the
        // decoder refuse any token whose header names something else.
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.secret, config.algorithm)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Mint a token for `sub`/`id` that expires `ttl` from now.
    pub fn issue(&self, sub: &str, id: &str, ttl: Duration) -> Result<String, TokenError> {
        let exp = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidClaims("expiry out of range"))?
            .timestamp();

        self.sign(&Claims {
            sub: sub.to_string(),
            id: id.to_string(),
            exp,
        })
    }

    /// Sign `claims` exactly as given.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        if claims.sub.trim().is_empty() {
            return Err(TokenError::InvalidClaims("empty subject"));
        }
        if claims.id.trim().is_empty() {
            return Err(TokenError::InvalidClaims("empty user id"));
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::InvalidClaims("expiry is not in the future"));
        }

        encode(&Header::new(self.algorithm), claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    /// Verify signature, algorithm and expiry, and return the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })
    }
}
