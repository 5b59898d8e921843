//! # Scoped configuration store
//!
//! Every piece of bot state lives under a [`ConfigKey`]: a scope (global,
//! guild or user) plus a field name, holding one JSON document. Monitors and
//! admin operations talk to the store through the [`ConfigStore`] trait so the
//! backing database can be swapped out in tests.

pub mod database;
pub mod locks;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

pub use database::DbConfigStore;
pub use locks::KeyLocks;

/// Kind of entity a value is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Guild,
    User,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Guild => "guild",
            ScopeKind::User => "user",
        }
    }
}

/// Entity a value is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Guild(u64),
    User(u64),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Global => ScopeKind::Global,
            Scope::Guild(_) => ScopeKind::Guild,
            Scope::User(_) => ScopeKind::User,
        }
    }

    /// Identifier persisted alongside the scope kind; empty for the global scope.
    pub fn scope_id(&self) -> String {
        match self {
            Scope::Global => String::new(),
            Scope::Guild(id) | Scope::User(id) => id.to_string(),
        }
    }
}

/// Address of a single stored value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub scope: Scope,
    pub field: &'static str,
}

impl ConfigKey {
    pub fn global(field: &'static str) -> Self {
        Self {
            scope: Scope::Global,
            field,
        }
    }

    pub fn guild(guild_id: u64, field: &'static str) -> Self {
        Self {
            scope: Scope::Guild(guild_id),
            field,
        }
    }

    pub fn user(user_id: u64, field: &'static str) -> Self {
        Self {
            scope: Scope::User(user_id),
            field,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Global => write!(f, "global/{}", self.field),
            scope => write!(f, "{}:{}/{}", scope.kind().as_str(), scope.scope_id(), self.field),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("invalid value stored at {key}: {source}")]
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    #[error("update of {key} finished without applying its mutation")]
    MutationSkipped { key: String },
}

/// Mutation applied to the current value of a key while its lock is held.
pub type Mutation = Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send>;

/// Persistent JSON key-value store with per-key serialisation of updates.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &ConfigKey) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &ConfigKey, value: Value) -> Result<(), StoreError>;

    /// Applies `mutation` to the current value and persists the result. No
    /// other `set` or `update` on the same key interleaves with it.
    async fn update(&self, key: &ConfigKey, mutation: Mutation) -> Result<Value, StoreError>;

    /// Every entity of `kind` that has `field` set, ordered by scope id.
    async fn scan(&self, kind: ScopeKind, field: &'static str)
    -> Result<Vec<(Scope, Value)>, StoreError>;
}

fn decode<T: DeserializeOwned>(key: &ConfigKey, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &ConfigKey, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })
}

impl dyn ConfigStore {
    /// Reads a typed value, falling back to `T::default()` when unset.
    pub async fn load<T>(&self, key: &ConfigKey) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.load_opt(key).await?.unwrap_or_default())
    }

    pub async fn load_opt<T>(&self, key: &ConfigKey) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(key, value).map(Some),
        }
    }

    pub async fn store<T>(&self, key: &ConfigKey, value: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let value = encode(key, value)?;
        self.set(key, value).await
    }

    /// Typed read-modify-write under the key's lock. Returns the new value.
    pub async fn modify<T, F>(&self, key: &ConfigKey, apply: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        F: FnOnce(&mut T) + Send + 'static,
    {
        let (value, ()) = self.modify_with(key, apply).await?;
        Ok(value)
    }

    /// Like [`modify`](Self::modify), also returning what `apply` returned.
    /// Lets callers learn what changed without a second, unlocked read.
    pub async fn modify_with<T, R, F>(&self, key: &ConfigKey, apply: F) -> Result<(T, R), StoreError>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let owned_key = key.clone();
        let (outcome_tx, mut outcome_rx) = oneshot::channel();
        let updated = self
            .update(
                key,
                Box::new(move |current| {
                    let mut value: T = match current {
                        None | Some(Value::Null) => T::default(),
                        Some(raw) => decode(&owned_key, raw)?,
                    };
                    let _ = outcome_tx.send(apply(&mut value));
                    encode(&owned_key, &value)
                }),
            )
            .await?;
        let outcome = outcome_rx
            .try_recv()
            .map_err(|_| StoreError::MutationSkipped {
                key: key.to_string(),
            })?;
        Ok((decode(key, updated)?, outcome))
    }
}
