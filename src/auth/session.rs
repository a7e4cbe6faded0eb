//! Login, signup, refresh and password-change flows.

use std::sync::LazyLock;

use regex::Regex;

use crate::auth::password;
use crate::auth::token::{TokenCodec, TokenError};
use crate::config::{RefreshExpiry, TokenLifetimes};
use crate::models::user::{NewUser, User};
use crate::store::{is_unique_violation, UserStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$")
        .expect("email pattern compiles")
});

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Please provide a valid email address")]
    InvalidEmail,
    #[error("We couldn't find account with this email, please signup")]
    UserNotFound,
    #[error("You already have an account with us. please continue with login")]
    AlreadyExists,
    #[error("New password is same as your old password")]
    NoOpChange,
    #[error("{}", invalid_token_message(.0))]
    InvalidToken(TokenError),
    #[error("unexpected failure: {0}")]
    Unexpected(#[source] BoxError),
}

fn invalid_token_message(err: &TokenError) -> &'static str {
    match err {
        TokenError::Missing => "Refresh token is required",
        TokenError::Expired => "Refresh token has expired",
        _ => "Invalid refresh token",
    }
}

impl AuthError {
    /// Stable machine-readable code for the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::AlreadyExists => "ALREADY_EXISTS",
            AuthError::NoOpChange => "NO_OP_CHANGE",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::Unexpected(_) => "UNEXPECTED",
        }
    }

    fn unexpected(err: impl Into<BoxError>) -> Self {
        AuthError::Unexpected(err.into())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(inner: sqlx::Error) -> Self {
        AuthError::unexpected(inner)
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(inner: argon2::password_hash::Error) -> Self {
        AuthError::unexpected(inner)
    }
}

/// An identity together with a freshly minted token pair.
#[derive(Debug)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Trim and lowercase, so lookups match however the address was typed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize `email` and require a `local@domain.tld` shape.
pub fn parse_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(&email) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

pub struct SessionIssuer<'a, S: ?Sized> {
    users: &'a S,
    tokens: &'a TokenCodec,
    lifetimes: TokenLifetimes,
}

impl<'a, S: UserStore + ?Sized> SessionIssuer<'a, S> {
    pub fn new(users: &'a S, tokens: &'a TokenCodec, lifetimes: TokenLifetimes) -> Self {
        Self {
            users,
            tokens,
            lifetimes,
        }
    }

    pub async fn login(&self, email: &str, plaintext: &str) -> Result<IssuedSession, AuthError> {
        let email = parse_email(email)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !password::verify(plaintext, &user.credential()) {
            tracing::debug!(user_id = %user.id, "login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "login succeeded");
        self.issue_pair(user)
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        plaintext: &str,
    ) -> Result<IssuedSession, AuthError> {
        let email = parse_email(email)?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let credential = password::hash(plaintext)?;
        let user = self
            .users
            .create(NewUser {
                name: name.trim().to_string(),
                email,
                credential,
            })
            .await
            .map_err(|e| {
                // Lost a race with a concurrent signup for the same address.
                if is_unique_violation(&e) {
                    AuthError::AlreadyExists
                } else {
                    AuthError::from(e)
                }
            })?;

        tracing::info!(user_id = %user.id, "signup succeeded");
        self.issue_pair(user)
    }

    /// Mint a new access token from a refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .tokens
            .decode(refresh_token)
            .map_err(AuthError::InvalidToken)?;

        let token = match self.lifetimes.refresh_expiry {
            RefreshExpiry::Fresh => self
                .tokens
                .issue(&claims.sub, &claims.id, self.lifetimes.access),
            RefreshExpiry::Inherit => self.tokens.sign(&claims),
        }
        .map_err(|e| match e {
            // Claims decoded but can't be re-signed, e.g. a token without an id.
            TokenError::InvalidClaims(_) => AuthError::InvalidToken(TokenError::Malformed),
            other => AuthError::unexpected(other),
        })?;

        tracing::info!(user_id = %claims.id, "access token refreshed");
        Ok(token)
    }

    pub async fn change_password(
        &self,
        identity: &User,
        old_plaintext: &str,
        new_plaintext: &str,
    ) -> Result<String, AuthError> {
        let stored = self
            .users
            .find_by_id(&identity.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !password::verify(old_plaintext, &stored.credential()) {
            return Err(AuthError::InvalidCredentials);
        }
        if new_plaintext == old_plaintext {
            return Err(AuthError::NoOpChange);
        }

        let credential = password::hash(new_plaintext)?;
        let updated = self
            .users
            .update_password(&stored.id, &credential)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %updated.id, "password changed");
        self.access_token(&updated)
    }

    fn issue_pair(&self, user: User) -> Result<IssuedSession, AuthError> {
        let access_token = self.access_token(&user)?;
        let refresh_token = self
            .tokens
            .issue(&user.email, &user.id, self.lifetimes.refresh)
            .map_err(AuthError::unexpected)?;

        Ok(IssuedSession {
            user,
            access_token,
            refresh_token,
        })
    }

    fn access_token(&self, user: &User) -> Result<String, AuthError> {
        self.tokens
            .issue(&user.email, &user.id, self.lifetimes.access)
            .map_err(AuthError::unexpected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::Algorithm;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::password::Credential;
    use crate::store::Store;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"session-test-secret", Algorithm::HS256)
    }

    fn lifetimes(refresh_expiry: RefreshExpiry) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::minutes(20),
            refresh: Duration::days(7),
            refresh_expiry,
        }
    }

    #[tokio::test]
    async fn signup_then_login_with_normalized_email() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));

        let signed_up = issuer.signup(" Ada ", "a@x.com", "pw1").await.unwrap();
        assert_eq!(signed_up.user.email, "a@x.com");
        assert_eq!(signed_up.user.name, "Ada");

        let session = issuer.login("A@X.com ", "pw1").await.unwrap();
        assert_eq!(session.user.id, signed_up.user.id);

        let access = tokens.decode(&session.access_token).unwrap();
        let refresh = tokens.decode(&session.refresh_token).unwrap();
        assert_eq!(access.sub, "a@x.com");
        assert_eq!(access.id, session.user.id);
        assert_eq!((refresh.sub.as_str(), refresh.id.as_str()), (access.sub.as_str(), access.id.as_str()));
        assert!(refresh.exp > access.exp);
    }

    #[tokio::test]
    async fn login_failures_are_distinguished() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));
        issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();

        assert!(matches!(
            issuer.login("nobody@x.com", "pw1").await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            issuer.login("a@x.com", "pw2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            issuer.login("a@x.com", " pw1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected_case_insensitively() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));
        issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();

        let err = issuer.signup("Other", "  A@X.COM", "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
        assert_eq!(err.code(), "ALREADY_EXISTS");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn refresh_with_fresh_expiry_uses_access_ttl() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));
        let session = issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();

        let refreshed = issuer.refresh(&session.refresh_token).unwrap();
        let claims = tokens.decode(&refreshed).unwrap();
        let refresh_claims = tokens.decode(&session.refresh_token).unwrap();

        assert_eq!(claims.id, session.user.id);
        assert!(claims.exp <= Utc::now().timestamp() + 20 * 60);
        assert!(claims.exp < refresh_claims.exp);
    }

    #[tokio::test]
    async fn refresh_with_inherited_expiry_copies_exp() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Inherit));
        let session = issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();

        let refreshed = issuer.refresh(&session.refresh_token).unwrap();
        let claims = tokens.decode(&refreshed).unwrap();
        let refresh_claims = tokens.decode(&session.refresh_token).unwrap();

        assert_eq!(claims, refresh_claims);
    }

    #[tokio::test]
    async fn refresh_rejects_bad_tokens() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));

        let missing = issuer.refresh("").unwrap_err();
        assert!(matches!(missing, AuthError::InvalidToken(TokenError::Missing)));
        assert_eq!(missing.to_string(), "Refresh token is required");

        assert!(matches!(
            issuer.refresh("garbage"),
            Err(AuthError::InvalidToken(TokenError::Malformed))
        ));

        let foreign = TokenCodec::new(b"another-secret", Algorithm::HS256)
            .issue("a@x.com", "user-1", Duration::days(1))
            .unwrap();
        assert!(matches!(
            issuer.refresh(&foreign),
            Err(AuthError::InvalidToken(TokenError::InvalidSignature))
        ));
    }

    #[tokio::test]
    async fn change_password_rules() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));
        let session = issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();
        let original_hash = session.user.password_hash.clone();

        assert!(matches!(
            issuer.change_password(&session.user, "wrong", "pw2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            issuer.change_password(&session.user, "pw1", "pw1").await,
            Err(AuthError::NoOpChange)
        ));
        let unchanged = store.find_by_id(&session.user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.password_hash, original_hash);

        let token = issuer
            .change_password(&session.user, "pw1", "pw2")
            .await
            .unwrap();
        assert_eq!(tokens.decode(&token).unwrap().id, session.user.id);

        assert!(matches!(
            issuer.login("a@x.com", "pw1").await,
            Err(AuthError::InvalidCredentials)
        ));
        issuer.login("a@x.com", "pw2").await.unwrap();
    }

    #[tokio::test]
    async fn change_password_for_vanished_user() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));
        let mut session = issuer.signup("Ada", "a@x.com", "pw1").await.unwrap();
        session.user.id = "deleted".into();

        assert!(matches!(
            issuer.change_password(&session.user, "pw1", "pw2").await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn email_shape_is_checked_after_normalizing() {
        assert_eq!(parse_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert_eq!(parse_email("a.b+tag@mail.x.co").unwrap(), "a.b+tag@mail.x.co");

        for bad in ["", "   ", "not-an-email", "@x.com", "a@", "a@x", "a b@x.com", "a@@x.com"] {
            assert!(
                matches!(parse_email(bad), Err(AuthError::InvalidEmail)),
                "{bad:?} should be rejected"
            );
        }
        assert!(parse_email(&format!("{}@x.com", "a".repeat(260))).is_err());
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_before_touching_the_store() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        let issuer = SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh));

        for bad in ["", "   ", "not-an-email"] {
            let err = issuer.signup("Ada", bad, "pw1").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidEmail));
            assert_eq!(err.code(), "INVALID_EMAIL");

            assert!(matches!(
                issuer.login(bad, "pw1").await,
                Err(AuthError::InvalidEmail)
            ));
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    /// Answers every email lookup with "not found", so signup only learns about
    /// an existing account from the unique index.
    struct BlindLookup<'a>(&'a Store);

    #[async_trait]
    impl UserStore for BlindLookup<'_> {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, sqlx::Error> {
            Ok(None)
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
            self.0.find_by_id(id).await
        }

        async fn create(&self, user: NewUser) -> Result<User, sqlx::Error> {
            self.0.create(user).await
        }

        async fn update_password(
            &self,
            id: &str,
            credential: &Credential,
        ) -> Result<Option<User>, sqlx::Error> {
            self.0.update_password(id, credential).await
        }

        async fn update_name(&self, id: &str, name: &str) -> Result<Option<User>, sqlx::Error> {
            self.0.update_name(id, name).await
        }

        async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
            self.0.list(limit, offset).await
        }

        async fn count(&self) -> Result<i64, sqlx::Error> {
            self.0.count().await
        }
    }

    #[tokio::test]
    async fn concurrent_signup_losing_the_insert_is_already_exists() {
        let store = Store::in_memory().await.unwrap();
        let tokens = codec();
        SessionIssuer::new(&store, &tokens, lifetimes(RefreshExpiry::Fresh))
            .signup("Ada", "a@x.com", "pw1")
            .await
            .unwrap();

        let blind = BlindLookup(&store);
        let issuer = SessionIssuer::new(&blind, &tokens, lifetimes(RefreshExpiry::Fresh));
        let err = issuer.signup("Other", "A@x.com", "pw2").await.unwrap_err();

        assert!(matches!(err, AuthError::AlreadyExists), "{err:?}");
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
