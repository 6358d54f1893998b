//! Session bridge: credential checks against the user store and the
//! backend token handed to the compliance API.

pub mod password;
pub mod token;

pub use password::{PasswordError, hash_password, verify_password};
pub use token::{BackendClaims, Credential, TOKEN_LIFETIME_SECS, TokenError, TokenIssuer};
