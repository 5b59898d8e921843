//! # Config Entry Model
//!
//! One JSON value in the scoped key-value store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "config_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub scope_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub field: String,

    /// Serialized JSON document.
    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
