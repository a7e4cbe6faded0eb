//! Credentials, tokens, sessions and the request gate.

pub mod gate;
pub mod password;
pub mod session;
pub mod token;

pub use gate::CurrentUser;
pub use session::{AuthError, IssuedSession, SessionIssuer};
pub use token::{Claims, TokenCodec, TokenError};
