//! Process wiring: builds the services from [`AppConfig`], starts the
//! monitors and serves the operator API until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browse::BrowseSessions;
use crate::compliance::{ComplianceEnforcer, EnforcementReport};
use crate::config::AppConfig;
use crate::db;
use crate::disclaimers::DisclaimerService;
use crate::monitor::{Check, MonitorRegistry, Readiness};
use crate::platform::{ChatPlatform, DiscordClient};
use crate::repositories::{
    ComplianceSettingsRepository, DisclaimerRepository, WeatherProfileRepository,
    WeatherStatsRepository,
};
use crate::server::{self, AppState};
use crate::store::{ConfigStore, DbConfigStore};
use crate::summary::Summarizer;
use crate::weather::{
    ForecastAlertMonitor, SevereAlertMonitor, WeatherClient, WeatherService, ZipCodeTable,
    alerts::AlertContext,
};

/// Everything a running process needs: the API state and the monitor checks.
pub struct Services {
    pub state: AppState,
    pub checks: Vec<Arc<dyn Check>>,
}

/// Assembles the services on top of an already migrated database and a
/// chat platform.
pub fn assemble(
    config: Arc<AppConfig>,
    db: Arc<sea_orm::DatabaseConnection>,
    platform: Arc<dyn ChatPlatform>,
    zip_codes: ZipCodeTable,
) -> Result<Services> {
    let store: Arc<dyn ConfigStore> = Arc::new(DbConfigStore::new(Arc::clone(&db)));

    let compliance = ComplianceEnforcer::new(
        Arc::clone(&platform),
        ComplianceSettingsRepository::new(Arc::clone(&store)),
    );

    let context = AlertContext {
        platform: Arc::clone(&platform),
        client: Arc::new(
            WeatherClient::new(&config.weather).context("building weather HTTP client")?,
        ),
        zip_codes: Arc::new(zip_codes),
        profiles: WeatherProfileRepository::new(Arc::clone(&store)),
        stats: WeatherStatsRepository::new(Arc::clone(&store)),
    };
    let summarizer = Arc::new(Summarizer::new(&config.summary));

    let checks: Vec<Arc<dyn Check>> = vec![
        Arc::new(compliance.clone()),
        Arc::new(SevereAlertMonitor::new(
            context.clone(),
            config.weather.severe_interval(),
        )),
        Arc::new(ForecastAlertMonitor::freeze(context.clone(), &config.weather)),
        Arc::new(ForecastAlertMonitor::heat(context.clone(), &config.weather)),
    ];

    let state = AppState {
        browse: BrowseSessions::new(Arc::clone(&platform), config.paginator_timeout()),
        disclaimers: DisclaimerService::new(
            DisclaimerRepository::new(store),
            Arc::clone(&platform),
        ),
        config,
        db,
        platform,
        compliance,
        weather: WeatherService::new(context, summarizer),
    };

    Ok(Services { state, checks })
}

async fn build(config: AppConfig) -> Result<Services> {
    let db = db::init_pool(&config).await?;
    db::run_migrations(&db).await?;

    let zip_codes = ZipCodeTable::load(&config.weather.zip_codes_path)?;

    let token = config.discord.bot_token.clone().unwrap_or_default();
    let platform: Arc<dyn ChatPlatform> = Arc::new(
        DiscordClient::new(&config.discord, token).context("building Discord client")?,
    );

    assemble(Arc::new(config), Arc::new(db), platform, zip_codes)
}

fn platform_ready(platform: &Arc<dyn ChatPlatform>) -> Readiness {
    let platform = Arc::clone(platform);
    Box::pin(async move { platform.wait_until_ready().await })
}

/// Runs the monitors and the operator API until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<()> {
    let has_bot = config.discord.bot_token.is_some();
    let Services { state, checks } = build(config).await?;

    let shutdown = CancellationToken::new();
    let registry = MonitorRegistry::new(shutdown.child_token());

    if has_bot {
        for check in checks {
            registry
                .start(check, platform_ready(&state.platform))
                .await?;
        }
        info!(monitors = ?registry.running().await, "Monitors started");
    } else {
        warn!("No Discord bot token configured; monitors are disabled");
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => warn!(error = %err, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    let served = server::run_server(state, shutdown.clone()).await;
    shutdown.cancel();
    registry.shutdown().await;
    served
}

/// Performs a single compliance enforcement pass and exits.
pub async fn enforce_once(config: AppConfig) -> Result<EnforcementReport> {
    let Services { state, .. } = build(config).await?;
    state.platform.wait_until_ready().await;
    let report = state.compliance.enforce().await?;
    info!(
        evaluated = report.evaluated,
        left = report.left.len(),
        failed = report.failed.len(),
        "Enforcement pass finished"
    );
    Ok(report)
}
