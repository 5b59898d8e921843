//! # Repository Layer
//!
//! Typed accessors over the scoped [`ConfigStore`](crate::store::ConfigStore).
//! Each repository owns the field names of its slice of state and is cheap to
//! clone.

pub mod compliance_settings;
pub mod disclaimer;
pub mod weather_profile;
pub mod weather_stats;

pub use compliance_settings::{ComplianceSettings, ComplianceSettingsRepository};
pub use disclaimer::DisclaimerRepository;
pub use weather_profile::{Subscription, WeatherProfile, WeatherProfileRepository};
pub use weather_stats::WeatherStatsRepository;
