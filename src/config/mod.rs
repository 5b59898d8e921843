//! Configuration loading for guildkeeper.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `GUILDKEEPER_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "GUILDKEEPER_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `GUILDKEEPER_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_tokens: Vec<String>,
    #[serde(default = "default_paginator_timeout_seconds")]
    pub paginator_timeout_seconds: u64,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Chat platform REST credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
}

/// Weather APIs, postal table and alert monitor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WeatherConfig {
    #[serde(default = "default_nws_api_base")]
    pub nws_api_base: String,
    #[serde(default = "default_open_meteo_api_base")]
    pub open_meteo_api_base: String,
    /// NWS rejects requests without an identifying user agent.
    #[serde(default = "default_weather_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_zip_codes_path")]
    pub zip_codes_path: PathBuf,
    #[serde(default = "default_severe_alert_interval_seconds")]
    pub severe_alert_interval_seconds: u64,
    #[serde(default = "default_forecast_alert_interval_seconds")]
    pub freeze_alert_interval_seconds: u64,
    #[serde(default = "default_forecast_alert_interval_seconds")]
    pub heat_alert_interval_seconds: u64,
    #[serde(default = "default_freeze_threshold_f")]
    pub freeze_threshold_f: f64,
    #[serde(default = "default_heat_threshold_f")]
    pub heat_threshold_f: f64,
    /// When set, a forecast period is announced to a user only once.
    #[serde(default)]
    pub forecast_alert_dedupe: bool,
}

/// Generative-text summary client. Disabled while no key is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SummaryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            operator_tokens: Vec::new(),
            paginator_timeout_seconds: default_paginator_timeout_seconds(),
            discord: DiscordConfig::default(),
            weather: WeatherConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_discord_api_base(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            nws_api_base: default_nws_api_base(),
            open_meteo_api_base: default_open_meteo_api_base(),
            user_agent: default_weather_user_agent(),
            zip_codes_path: default_zip_codes_path(),
            severe_alert_interval_seconds: default_severe_alert_interval_seconds(),
            freeze_alert_interval_seconds: default_forecast_alert_interval_seconds(),
            heat_alert_interval_seconds: default_forecast_alert_interval_seconds(),
            freeze_threshold_f: default_freeze_threshold_f(),
            heat_threshold_f: default_heat_threshold_f(),
            forecast_alert_dedupe: false,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_api_base: default_openai_api_base(),
            openai_model: default_openai_model(),
        }
    }
}

impl WeatherConfig {
    /// Validate monitor intervals and alert thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("severe", self.severe_alert_interval_seconds),
            ("freeze", self.freeze_alert_interval_seconds),
            ("heat", self.heat_alert_interval_seconds),
        ] {
            if value < 60 {
                return Err(ConfigError::InvalidAlertInterval {
                    monitor: name.to_string(),
                    value,
                });
            }
        }

        if !self.freeze_threshold_f.is_finite()
            || !self.heat_threshold_f.is_finite()
            || self.freeze_threshold_f >= self.heat_threshold_f
        {
            return Err(ConfigError::InvalidThresholds {
                freeze: self.freeze_threshold_f,
                heat: self.heat_threshold_f,
            });
        }

        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingWeatherUserAgent);
        }

        Ok(())
    }

    pub fn severe_interval(&self) -> Duration {
        Duration::from_secs(self.severe_alert_interval_seconds)
    }

    pub fn freeze_interval(&self) -> Duration {
        Duration::from_secs(self.freeze_alert_interval_seconds)
    }

    pub fn heat_interval(&self) -> Duration {
        Duration::from_secs(self.heat_alert_interval_seconds)
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    pub fn paginator_timeout(&self) -> Duration {
        Duration::from_secs(self.paginator_timeout_seconds)
    }

    fn is_dev_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();

        if !config.operator_tokens.is_empty() {
            config.operator_tokens = vec![REDACTED.to_string()];
        }
        if config.discord.bot_token.is_some() {
            config.discord.bot_token = Some(REDACTED.to_string());
        }
        if config.summary.openai_api_key.is_some() {
            config.summary.openai_api_key = Some(REDACTED.to_string());
        }

        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator_tokens.is_empty() {
            return Err(ConfigError::MissingOperatorTokens);
        }

        // Local and test profiles may run the API without a live bot.
        if !self.is_dev_profile() && self.discord.bot_token.is_none() {
            return Err(ConfigError::MissingDiscordBotToken);
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if !(30..=90).contains(&self.paginator_timeout_seconds) {
            return Err(ConfigError::InvalidPaginatorTimeout {
                value: self.paginator_timeout_seconds,
            });
        }

        self.weather.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://guildkeeper.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_paginator_timeout_seconds() -> u64 {
    30
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_nws_api_base() -> String {
    "https://api.weather.gov".to_string()
}

fn default_open_meteo_api_base() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_weather_user_agent() -> String {
    format!("guildkeeper/{}", env!("CARGO_PKG_VERSION"))
}

fn default_zip_codes_path() -> PathBuf {
    PathBuf::from("data/zipcodes.csv")
}

fn default_severe_alert_interval_seconds() -> u64 {
    900 // 15 minutes
}

fn default_forecast_alert_interval_seconds() -> u64 {
    604800 // 1 week
}

fn default_freeze_threshold_f() -> f64 {
    10.0
}

fn default_heat_threshold_f() -> f64 {
    100.0
}

fn default_openai_api_base() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-nano".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error(
        "no operator tokens configured; set GUILDKEEPER_OPERATOR_TOKEN or GUILDKEEPER_OPERATOR_TOKENS"
    )]
    MissingOperatorTokens,
    #[error("discord bot token is missing; set GUILDKEEPER_DISCORD_BOT_TOKEN")]
    MissingDiscordBotToken,
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("paginator timeout must be between 30 and 90 seconds, got {value}")]
    InvalidPaginatorTimeout { value: u64 },
    #[error("{monitor} alert interval must be at least 60 seconds, got {value}")]
    InvalidAlertInterval { monitor: String, value: u64 },
    #[error("freeze threshold ({freeze}) must be below heat threshold ({heat})")]
    InvalidThresholds { freeze: f64, heat: f64 },
    #[error("weather user agent must not be empty")]
    MissingWeatherUserAgent,
    #[error("invalid value '{value}' for GUILDKEEPER_{key}")]
    InvalidValue { key: String, value: String },
}

/// Loads configuration using layered `.env` files and `GUILDKEEPER_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env` layers, overlays the process environment and validates the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let config = Self::from_layered(layered, profile_hint)?;

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn from_layered(
        mut layered: BTreeMap<String, String>,
        profile_hint: String,
    ) -> Result<AppConfig, ConfigError> {
        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);

        // Support both a single token and a comma-separated list
        let operator_tokens = if let Some(tokens) = layered.remove("OPERATOR_TOKENS") {
            split_list(&tokens)
        } else if let Some(token) = take_string(&mut layered, "OPERATOR_TOKEN") {
            vec![token]
        } else {
            Vec::new()
        };

        let discord = DiscordConfig {
            bot_token: take_string(&mut layered, "DISCORD_BOT_TOKEN"),
            api_base: take_string(&mut layered, "DISCORD_API_BASE")
                .unwrap_or_else(default_discord_api_base),
        };

        let weather = WeatherConfig {
            nws_api_base: take_string(&mut layered, "NWS_API_BASE")
                .unwrap_or_else(default_nws_api_base),
            open_meteo_api_base: take_string(&mut layered, "OPEN_METEO_API_BASE")
                .unwrap_or_else(default_open_meteo_api_base),
            user_agent: take_string(&mut layered, "WEATHER_USER_AGENT")
                .unwrap_or_else(default_weather_user_agent),
            zip_codes_path: take_string(&mut layered, "ZIP_CODES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_zip_codes_path),
            severe_alert_interval_seconds: take_parsed(
                &mut layered,
                "SEVERE_ALERT_INTERVAL_SECONDS",
            )?
            .unwrap_or_else(default_severe_alert_interval_seconds),
            freeze_alert_interval_seconds: take_parsed(
                &mut layered,
                "FREEZE_ALERT_INTERVAL_SECONDS",
            )?
            .unwrap_or_else(default_forecast_alert_interval_seconds),
            heat_alert_interval_seconds: take_parsed(&mut layered, "HEAT_ALERT_INTERVAL_SECONDS")?
                .unwrap_or_else(default_forecast_alert_interval_seconds),
            freeze_threshold_f: take_parsed(&mut layered, "FREEZE_THRESHOLD_F")?
                .unwrap_or_else(default_freeze_threshold_f),
            heat_threshold_f: take_parsed(&mut layered, "HEAT_THRESHOLD_F")?
                .unwrap_or_else(default_heat_threshold_f),
            forecast_alert_dedupe: take_parsed(&mut layered, "FORECAST_ALERT_DEDUPE")?
                .unwrap_or(false),
        };

        let summary = SummaryConfig {
            openai_api_key: take_string(&mut layered, "OPENAI_API_KEY"),
            openai_api_base: take_string(&mut layered, "OPENAI_API_BASE")
                .unwrap_or_else(default_openai_api_base),
            openai_model: take_string(&mut layered, "OPENAI_MODEL")
                .unwrap_or_else(default_openai_model),
        };

        Ok(AppConfig {
            profile,
            api_bind_addr: take_string(&mut layered, "API_BIND_ADDR")
                .unwrap_or_else(default_api_bind_addr),
            log_level: take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level),
            log_format: take_string(&mut layered, "LOG_FORMAT")
                .unwrap_or_else(default_log_format),
            database_url: take_string(&mut layered, "DATABASE_URL")
                .unwrap_or_else(default_database_url),
            db_max_connections: take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
                .unwrap_or_else(default_db_max_connections),
            db_acquire_timeout_ms: take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
                .unwrap_or_else(default_db_acquire_timeout_ms),
            operator_tokens,
            paginator_timeout_seconds: take_parsed(&mut layered, "PAGINATOR_TIMEOUT_SECONDS")?
                .unwrap_or_else(default_paginator_timeout_seconds),
            discord,
            weather,
            summary,
        })
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
