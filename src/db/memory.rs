use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::Identity;
use crate::db::CredentialStore;
use crate::error::DatabaseError;

/// In-process identity store for tests and local development.
///
/// The uniqueness check and the insert happen under a single write lock,
/// which plays the role of the database's unique constraints.
#[derive(Default)]
pub struct MemoryCredentialStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert_identity(&self, identity: Identity) -> Result<Identity, DatabaseError> {
        let mut identities = self.identities.write().await;

        if identities.values().any(|existing| existing.email == identity.email) {
            return Err(DatabaseError::Duplicate("email".to_string()));
        }
        if identities.values().any(|existing| existing.username == identity.username) {
            return Err(DatabaseError::Duplicate("username".to_string()));
        }

        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let identities = self.identities.read().await;
        Ok(identities.values().find(|i| i.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, DatabaseError> {
        let identities = self.identities.read().await;
        Ok(identities.values().find(|i| i.username == username).cloned())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.identities.write().await.remove(&id).is_some())
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        Ok(self.identities.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity(username: &str, email: &str) -> Identity {
        Identity::new(username.to_string(), email.to_string(), "hash".to_string())
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryCredentialStore::new();
        let created = store.insert_identity(identity("ada", "ada@x.com")).await.unwrap();

        let by_email = store.find_by_email("ada@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_name = store.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert!(store.find_by_username("Ada").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_conflict_reported_before_username() {
        let store = MemoryCredentialStore::new();
        store.insert_identity(identity("ada", "ada@x.com")).await.unwrap();

        let err = store.insert_identity(identity("ada", "ada@x.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(ref f) if f == "email"));

        let err = store.insert_identity(identity("ada", "other@x.com")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(ref f) if f == "username"));

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_with_same_email() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_identity(identity(&format!("user{}", n), "same@x.com"))
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCredentialStore::new();
        let created = store.insert_identity(identity("ada", "ada@x.com")).await.unwrap();
        assert!(store.delete_identity(created.id).await.unwrap());
        assert!(!store.delete_identity(created.id).await.unwrap());
        assert!(store.find_by_id(created.id).await.unwrap().is_none());
    }
}
