//! # Disclaimer Repository
//!
//! Ordered, duplicate-free list of disclaimer texts per user.

use std::sync::Arc;

use crate::platform::UserId;
use crate::store::{ConfigKey, ConfigStore, Scope, ScopeKind, StoreError};

const DISCLAIMERS: &str = "disclaimers";

#[derive(Clone)]
pub struct DisclaimerRepository {
    store: Arc<dyn ConfigStore>,
}

impl DisclaimerRepository {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user_id: UserId) -> Result<Vec<String>, StoreError> {
        self.store
            .load(&ConfigKey::user(user_id, DISCLAIMERS))
            .await
    }

    /// Returns `false` when the text was already present.
    pub async fn add(&self, user_id: UserId, text: &str) -> Result<bool, StoreError> {
        let text = text.to_string();
        let (_, added) = self
            .store
            .modify_with(
                &ConfigKey::user(user_id, DISCLAIMERS),
                move |texts: &mut Vec<String>| {
                    if texts.contains(&text) {
                        return false;
                    }
                    texts.push(text);
                    true
                },
            )
            .await?;
        Ok(added)
    }

    /// Returns `false` when the text was not present.
    pub async fn remove(&self, user_id: UserId, text: &str) -> Result<bool, StoreError> {
        let text = text.to_string();
        let (_, removed) = self
            .store
            .modify_with(
                &ConfigKey::user(user_id, DISCLAIMERS),
                move |texts: &mut Vec<String>| {
                    let before = texts.len();
                    texts.retain(|existing| *existing != text);
                    texts.len() < before
                },
            )
            .await?;
        Ok(removed)
    }

    /// Every user with at least one disclaimer, with their texts.
    pub async fn all(&self) -> Result<Vec<(UserId, Vec<String>)>, StoreError> {
        let entries = self.store.scan(ScopeKind::User, DISCLAIMERS).await?;
        let mut users = Vec::new();
        for (scope, value) in entries {
            let Scope::User(user_id) = scope else {
                continue;
            };
            let texts: Vec<String> =
                serde_json::from_value(value).map_err(|source| StoreError::Serialization {
                    key: ConfigKey::user(user_id, DISCLAIMERS).to_string(),
                    source,
                })?;
            if !texts.is_empty() {
                users.push((user_id, texts));
            }
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DbConfigStore;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn repository() -> DisclaimerRepository {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        DisclaimerRepository::new(Arc::new(DbConfigStore::new(Arc::new(db))))
    }

    #[tokio::test]
    async fn test_concurrent_adds_report_one_change() {
        let repo = repository().await;

        let (first, second) = tokio::join!(repo.add(1, "text"), repo.add(1, "text"));

        let changes = [first.unwrap(), second.unwrap()];
        assert_eq!(changes.iter().filter(|changed| **changed).count(), 1);
        assert_eq!(repo.list(1).await.unwrap(), vec!["text"]);
    }

    #[tokio::test]
    async fn test_all_skips_users_without_disclaimers() {
        let repo = repository().await;
        repo.add(1, "a").await.unwrap();
        repo.add(2, "b").await.unwrap();
        repo.remove(2, "b").await.unwrap();

        assert_eq!(repo.all().await.unwrap(), vec![(1, vec!["a".to_string()])]);
    }
}
