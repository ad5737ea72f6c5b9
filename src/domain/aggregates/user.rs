//! User Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Capability, Role};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub logo: Option<String>,
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn register(name: impl Into<String>, email: impl Into<String>, password_hash: Option<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: normalize_email(&email.into()),
            password_hash,
            role,
            is_verified: false,
            is_active: true,
            google_id: None,
            facebook_id: None,
            phone: None,
            company_name: None,
            logo: None,
            documents: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can(&self, capability: Capability) -> bool { self.role.can(capability) }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_normalizes_email() {
        let user = User::register("Abebe", "  Abebe@Example.COM ", None, Role::Seller);
        assert_eq!(user.email, "abebe@example.com");
        assert!(user.is_active);
        assert!(!user.is_verified);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::register("A", "a@example.com", Some("$argon2id$secret".into()), Role::Buyer);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "buyer");
    }
}
