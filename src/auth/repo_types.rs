use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Coarse-grained authorization tag gating the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored role value. Anything unrecognized demotes to `user`,
    /// so a bad row can never grant admin access.
    pub fn parse_lenient(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Role::parse_lenient(&value))
    }
}

/// Principal record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub id: Uuid,                      // unique principal ID
    pub email: String,                 // unique, case-sensitive lookup key
    pub name: String,                  // display label, no uniqueness
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // bcrypt digest, not exposed in JSON
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: OffsetDateTime,    // creation timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_role_demotes_to_user() {
        assert_eq!(Role::parse_lenient("admin"), Role::Admin);
        assert_eq!(Role::parse_lenient("user"), Role::User);
        assert_eq!(Role::parse_lenient(""), Role::User);
        assert_eq!(Role::parse_lenient("superuser"), Role::User);
        assert_eq!(Role::parse_lenient("Admin"), Role::User);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
