//! # Weather Profile Repository
//!
//! Per-user weather settings (postal code, alert opt-ins) and the ledgers of
//! alerts already delivered to each user.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::monitor::DedupeRecord;
use crate::platform::UserId;
use crate::store::{ConfigKey, ConfigStore, Scope, ScopeKind, StoreError};
use crate::weather::AlertKind;

const ZIP_CODE: &str = "zip_code";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WeatherProfile {
    pub user_id: UserId,
    pub zip_code: Option<String>,
    pub severe_alerts: bool,
    pub freeze_alerts: bool,
    pub heat_alerts: bool,
    /// Number of distinct severe alerts delivered so far.
    pub alerts_delivered: usize,
}

/// An enabled alert subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: UserId,
    /// Delivery destination (the user's direct messages).
    pub target_id: UserId,
    pub zip_code: Option<String>,
}

#[derive(Clone)]
pub struct WeatherProfileRepository {
    store: Arc<dyn ConfigStore>,
}

impl WeatherProfileRepository {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn profile(&self, user_id: UserId) -> Result<WeatherProfile, StoreError> {
        let ledger: Vec<String> = self
            .store
            .load(&ConfigKey::user(user_id, AlertKind::Severe.ledger_field()))
            .await?;

        Ok(WeatherProfile {
            user_id,
            zip_code: self.zip_code(user_id).await?,
            severe_alerts: self.alert_enabled(user_id, AlertKind::Severe).await?,
            freeze_alerts: self.alert_enabled(user_id, AlertKind::Freeze).await?,
            heat_alerts: self.alert_enabled(user_id, AlertKind::Heat).await?,
            alerts_delivered: ledger.len(),
        })
    }

    pub async fn zip_code(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        self.store
            .load_opt(&ConfigKey::user(user_id, ZIP_CODE))
            .await
    }

    pub async fn set_zip_code(&self, user_id: UserId, zip_code: &str) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::user(user_id, ZIP_CODE), &zip_code)
            .await
    }

    pub async fn alert_enabled(&self, user_id: UserId, kind: AlertKind) -> Result<bool, StoreError> {
        self.store
            .load(&ConfigKey::user(user_id, kind.flag_field()))
            .await
    }

    pub async fn set_alert(
        &self,
        user_id: UserId,
        kind: AlertKind,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.store
            .store(&ConfigKey::user(user_id, kind.flag_field()), &enabled)
            .await
    }

    /// Flips the `kind` opt-in under the key's lock and returns the new state.
    pub async fn toggle_alert(&self, user_id: UserId, kind: AlertKind) -> Result<bool, StoreError> {
        self.store
            .modify(
                &ConfigKey::user(user_id, kind.flag_field()),
                |enabled: &mut bool| *enabled = !*enabled,
            )
            .await
    }

    /// Users opted in to `kind`, in store order, with their postal code.
    pub async fn subscribers(&self, kind: AlertKind) -> Result<Vec<Subscription>, StoreError> {
        let flagged = self.store.scan(ScopeKind::User, kind.flag_field()).await?;

        let mut subscriptions = Vec::new();
        for (scope, value) in flagged {
            let Scope::User(user_id) = scope else {
                continue;
            };
            if value != Value::Bool(true) {
                continue;
            }
            subscriptions.push(Subscription {
                user_id,
                target_id: user_id,
                zip_code: self.zip_code(user_id).await?,
            });
        }
        Ok(subscriptions)
    }

    pub async fn subscriber_count(&self, kind: AlertKind) -> Result<usize, StoreError> {
        let flagged = self.store.scan(ScopeKind::User, kind.flag_field()).await?;
        Ok(flagged
            .iter()
            .filter(|(_, value)| *value == Value::Bool(true))
            .count())
    }

    pub async fn delivered(
        &self,
        user_id: UserId,
        kind: AlertKind,
    ) -> Result<DedupeRecord, StoreError> {
        let ids: Vec<String> = self
            .store
            .load(&ConfigKey::user(user_id, kind.ledger_field()))
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Appends `event_id` to the user's ledger for `kind` unless already present.
    pub async fn record_delivered(
        &self,
        user_id: UserId,
        kind: AlertKind,
        event_id: &str,
    ) -> Result<(), StoreError> {
        let event_id = event_id.to_string();
        self.store
            .modify(
                &ConfigKey::user(user_id, kind.ledger_field()),
                move |ids: &mut Vec<String>| {
                    if !ids.contains(&event_id) {
                        ids.push(event_id);
                    }
                },
            )
            .await?;
        Ok(())
    }
}
