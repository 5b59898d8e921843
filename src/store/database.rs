//! SeaORM-backed [`ConfigStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};
use serde_json::Value;
use tracing::warn;

use super::{ConfigKey, ConfigStore, KeyLocks, Mutation, Scope, ScopeKind, StoreError};
use crate::models::config_entry::{self, Entity as ConfigEntry};

/// Stores each value as a JSON text row in `config_entries`.
#[derive(Clone)]
pub struct DbConfigStore {
    db: Arc<DatabaseConnection>,
    locks: KeyLocks,
}

impl DbConfigStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            locks: KeyLocks::new(),
        }
    }

    async fn read(&self, key: &ConfigKey) -> Result<Option<Value>, StoreError> {
        let row = ConfigEntry::find_by_id((
            key.scope.kind().as_str().to_string(),
            key.scope.scope_id(),
            key.field.to_string(),
        ))
        .one(&*self.db)
        .await?;

        row.map(|row| parse_value(key, &row.value)).transpose()
    }

    async fn write(&self, key: &ConfigKey, value: &Value) -> Result<(), StoreError> {
        let entry = config_entry::ActiveModel {
            scope: Set(key.scope.kind().as_str().to_string()),
            scope_id: Set(key.scope.scope_id()),
            field: Set(key.field.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now().into()),
        };

        ConfigEntry::insert(entry)
            .on_conflict(
                OnConflict::columns([
                    config_entry::Column::Scope,
                    config_entry::Column::ScopeId,
                    config_entry::Column::Field,
                ])
                .update_columns([config_entry::Column::Value, config_entry::Column::UpdatedAt])
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        Ok(())
    }
}

fn parse_value(key: &ConfigKey, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

#[async_trait]
impl ConfigStore for DbConfigStore {
    async fn get(&self, key: &ConfigKey) -> Result<Option<Value>, StoreError> {
        self.read(key).await
    }

    async fn set(&self, key: &ConfigKey, value: Value) -> Result<(), StoreError> {
        let _guard = self.locks.lock(key).await;
        self.write(key, &value).await
    }

    async fn update(&self, key: &ConfigKey, mutation: Mutation) -> Result<Value, StoreError> {
        let _guard = self.locks.lock(key).await;
        let current = self.read(key).await?;
        let next = mutation(current)?;
        self.write(key, &next).await?;
        Ok(next)
    }

    async fn scan(
        &self,
        kind: ScopeKind,
        field: &'static str,
    ) -> Result<Vec<(Scope, Value)>, StoreError> {
        let rows = ConfigEntry::find()
            .filter(config_entry::Column::Scope.eq(kind.as_str()))
            .filter(config_entry::Column::Field.eq(field))
            .order_by_asc(config_entry::Column::ScopeId)
            .all(&*self.db)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let scope = match kind {
                ScopeKind::Global => Scope::Global,
                ScopeKind::Guild | ScopeKind::User => {
                    let Ok(id) = row.scope_id.parse::<u64>() else {
                        warn!(scope = kind.as_str(), scope_id = %row.scope_id, field, "Skipping entry with non-numeric scope id");
                        continue;
                    };
                    if kind == ScopeKind::Guild {
                        Scope::Guild(id)
                    } else {
                        Scope::User(id)
                    }
                }
            };
            let key = ConfigKey { scope, field };
            entries.push((scope, parse_value(&key, &row.value)?));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use serde_json::json;

    async fn setup_store() -> Arc<dyn ConfigStore> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Arc::new(DbConfigStore::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn test_get_set_roundtrip_and_overwrite() {
        let store = setup_store().await;
        let key = ConfigKey::global("max_guilds");

        assert_eq!(store.get(&key).await.unwrap(), None);
        store.set(&key, json!(5)).await.unwrap();
        store.set(&key, json!(7)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn test_typed_helpers_default_when_unset() {
        let store = setup_store().await;
        let key = ConfigKey::user(1, "sent_alerts");

        let ids: Vec<String> = store.load(&key).await.unwrap();
        assert!(ids.is_empty());

        let updated: Vec<String> = store
            .modify(&key, |ids: &mut Vec<String>| ids.push("NWS-1".to_string()))
            .await
            .unwrap();
        assert_eq!(updated, vec!["NWS-1".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_modify_loses_no_updates() {
        let store = setup_store().await;
        let key = ConfigKey::global("total_alerts_sent");

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .modify(&key, |count: &mut u64| *count += 1)
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let total: u64 = store.load(&key).await.unwrap();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_scan_filters_by_scope_and_field() {
        let store = setup_store().await;
        store
            .set(&ConfigKey::user(20, "severealerts"), json!(true))
            .await
            .unwrap();
        store
            .set(&ConfigKey::user(10, "severealerts"), json!(false))
            .await
            .unwrap();
        store
            .set(&ConfigKey::user(10, "zip_code"), json!("10001"))
            .await
            .unwrap();
        store
            .set(&ConfigKey::guild(10, "severealerts"), json!(true))
            .await
            .unwrap();

        let entries = store.scan(ScopeKind::User, "severealerts").await.unwrap();
        assert_eq!(
            entries,
            vec![
                (Scope::User(10), json!(false)),
                (Scope::User(20), json!(true)),
            ]
        );
    }
}
