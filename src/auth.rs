//! Password hashing and bearer tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Role;
use crate::{MarketplaceError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| MarketplaceError::Unauthorized("Not authorized, token failed".into()))
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, lifetime_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::days(lifetime_days),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims { sub: user_id.to_string(), role, iat: now.timestamp(), exp: (now + self.lifetime).timestamp() };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| MarketplaceError::Token(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| MarketplaceError::Unauthorized("Not authorized, token failed".into()))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(MarketplaceError::validation(format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| MarketplaceError::Storage(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
