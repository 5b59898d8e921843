//! # guildkeeper
//!
//! Background cogs for a guild-based chat bot: guild compliance enforcement,
//! severe/freeze/heat weather alerting, weather records and user disclaimers,
//! all driven by periodic monitors over a scoped key-value configuration store.

pub mod auth;
pub mod browse;
pub mod compliance;
pub mod config;
pub mod db;
pub mod disclaimers;
pub mod error;
pub mod handlers;
pub mod models;
pub mod monitor;
pub mod paginator;
pub mod platform;
pub mod repositories;
pub mod runtime;
pub mod server;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod weather;
pub use migration;
