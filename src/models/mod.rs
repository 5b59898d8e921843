//! # Data Models
//!
//! Persistent entities and shared response models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod config_entry;

pub use config_entry::Entity as ConfigEntry;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "guildkeeper".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
