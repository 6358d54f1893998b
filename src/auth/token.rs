use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Backend tokens expire seven days after issue.
pub const TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// Claims understood by the compliance API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl BackendClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// An immutable, session-scoped bearer credential.
///
/// Every call to the compliance API takes one of these explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    token: String,
    claims: BackendClaims,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &BackendClaims {
        &self.claims
    }

    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    /// Build a credential from parts without signing. Used by tests that
    /// talk to mock backends.
    #[doc(hidden)]
    pub fn from_parts(token: impl Into<String>, claims: BackendClaims) -> Self {
        Self {
            token: token.into(),
            claims,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Session expired. Please log in again.")]
    Expired,

    #[error("Invalid session token")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Signs and verifies HS256 backend tokens with the shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user_id: &str, email: &str, role: Role) -> Result<Credential, TokenError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Credential, TokenError> {
        let claims = BackendClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;

        Ok(Credential { token, claims })
    }

    pub fn verify(&self, token: &str) -> Result<Credential, TokenError> {
        let data = decode::<BackendClaims>(token, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            },
        )?;

        Ok(Credential {
            token: token.to_string(),
            claims: data.claims,
        })
    }
}
