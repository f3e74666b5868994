use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// A registered account. Never serialized directly; see [`PublicUser`].
#[derive(Clone, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The identity as exposed to clients and handlers, without the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_hash() {
        let identity = Identity::new(
            "ada".to_string(),
            "ada@x.com".to_string(),
            "$argon2id$v=19$secret".to_string(),
        );
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("ada@x.com"));
        assert!(!rendered.contains("$argon2id"));
    }

    #[test]
    fn public_view_drops_hash() {
        let identity = Identity::new("ada".into(), "ada@x.com".into(), "hash".into());
        let json = serde_json::to_value(identity.public()).unwrap();
        assert_eq!(json["username"], "ada");
        assert_eq!(json["id"], identity.id.to_string());
        assert!(json.get("password_hash").is_none());
    }
}
