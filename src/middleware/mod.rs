pub mod auth;
pub mod rate_limit;

pub use auth::{bearer_token, require_credential_from_headers};
