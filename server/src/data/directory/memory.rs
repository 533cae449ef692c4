//! In-process identity directory backed by dashmap

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{DirectoryError, IdentityDirectory};
use crate::data::identity::{IdentityRecord, IdentityUpdate, NewIdentity, Provider};

/// Identities held in memory for the lifetime of the process
///
/// `by_subject` indexes (provider, email) to record id and is the uniqueness guard.
#[derive(Default)]
pub struct InMemoryDirectory {
    records: DashMap<String, IdentityRecord>,
    by_subject: DashMap<(Provider, String), String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn find(
        &self,
        email: &str,
        provider: Provider,
    ) -> Result<Option<IdentityRecord>, DirectoryError> {
        let Some(id) = self
            .by_subject
            .get(&(provider, email.to_string()))
            .map(|id| id.value().clone())
        else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<IdentityRecord>, DirectoryError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn list(&self) -> Result<Vec<IdentityRecord>, DirectoryError> {
        let mut records: Vec<IdentityRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, DirectoryError> {
        match self
            .by_subject
            .entry((identity.provider, identity.email.clone()))
        {
            Entry::Occupied(_) => Err(DirectoryError::Duplicate {
                email: identity.email,
                provider: identity.provider,
            }),
            Entry::Vacant(slot) => {
                let now = chrono::Utc::now().timestamp();
                let record = IdentityRecord {
                    id: cuid2::create_id(),
                    email: identity.email,
                    provider: identity.provider,
                    role: identity.role,
                    nickname: identity.nickname,
                    avatar_url: identity.avatar_url,
                    password_hash: identity.password_hash,
                    created_at: now,
                    updated_at: now,
                };
                self.records.insert(record.id.clone(), record.clone());
                slot.insert(record.id.clone());
                tracing::debug!(id = %record.id, provider = %record.provider, "Identity created");
                Ok(record)
            }
        }
    }

    async fn update(
        &self,
        id: &str,
        update: IdentityUpdate,
    ) -> Result<IdentityRecord, DirectoryError> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        if let Some(nickname) = update.nickname {
            record.nickname = nickname;
        }
        if let Some(avatar_url) = update.avatar_url {
            record.avatar_url = Some(avatar_url);
        }
        if let Some(role) = update.role {
            record.role = role;
        }
        record.updated_at = chrono::Utc::now().timestamp();
        Ok(record.value().clone())
    }

    async fn delete(&self, id: &str) -> Result<IdentityRecord, DirectoryError> {
        let (_, record) = self
            .records
            .remove(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        self.by_subject
            .remove(&(record.provider, record.email.clone()));
        tracing::debug!(id = %record.id, provider = %record.provider, "Identity deleted");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::identity::Role;

    fn new_identity(email: &str, provider: Provider) -> NewIdentity {
        NewIdentity {
            email: email.to_string(),
            provider,
            role: Role::User,
            nickname: "nick".to_string(),
            avatar_url: None,
            password_hash: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let directory = InMemoryDirectory::new();
        let created = directory
            .create(new_identity("a@b.com", Provider::Local))
            .await
            .unwrap();

        let found = directory
            .find("a@b.com", Provider::Local)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(
            directory
                .find("a@b.com", Provider::Kakao)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_rejected_per_provider() {
        let directory = InMemoryDirectory::new();
        directory
            .create(new_identity("a@b.com", Provider::Local))
            .await
            .unwrap();

        let err = directory
            .create(new_identity("a@b.com", Provider::Local))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate { .. }));

        // Same email from another provider is a separate identity
        assert!(
            directory
                .create(new_identity("a@b.com", Provider::Naver))
                .await
                .is_ok()
        );
        assert_eq!(directory.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_role() {
        let directory = InMemoryDirectory::new();
        let created = directory
            .create(new_identity("a@b.com", Provider::Local))
            .await
            .unwrap();

        let updated = directory
            .update(
                &created.id,
                IdentityUpdate {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.nickname, "nick");

        let missing = directory.update("nope", IdentityUpdate::default()).await;
        assert!(matches!(missing, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_frees_subject() {
        let directory = InMemoryDirectory::new();
        let created = directory
            .create(new_identity("a@b.com", Provider::Local))
            .await
            .unwrap();

        let removed = directory.delete(&created.id).await.unwrap();
        assert_eq!(removed.email, "a@b.com");
        assert!(directory.find_by_id(&created.id).await.unwrap().is_none());
        assert!(
            directory
                .create(new_identity("a@b.com", Provider::Local))
                .await
                .is_ok()
        );
    }
}
