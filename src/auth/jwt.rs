//! HS256 session tokens
//!
//! A token carries the whole `User` in its claims so that a session can be
//! opened without a storage lookup.

use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::UserSerializer;
use super::user::{Privilege, User};
use crate::utils::error::TokenError;

const DEFAULT_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub privilege: Privilege,
    pub exp: usize,
}

pub struct JwtUserSerializer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl JwtUserSerializer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validity: DEFAULT_VALIDITY,
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

impl UserSerializer for JwtUserSerializer {
    fn serialize(&self, user: &User) -> Result<String, TokenError> {
        let expires = chrono::Utc::now()
            + chrono::Duration::from_std(self.validity).unwrap_or(chrono::Duration::hours(24));
        let claims = Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            privilege: user.privilege,
            exp: expires.timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    fn unserialize(&self, token: &str) -> User {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => User::new(data.claims.sub, data.claims.name, data.claims.privilege),
            Err(e) => {
                debug!("Rejected session token: {e}");
                User::anonymous()
            }
        }
    }
}

impl std::fmt::Debug for JwtUserSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtUserSerializer")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}
