use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use compute::business_day::parse_timezone;
use compute::default_desk;
use config::{Config, Environment, File};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde::Deserialize;
use tracing::{debug, info};

use crate::schemas::AppState;

/// Runtime configuration of the service.
///
/// Sources, lowest priority first: built-in defaults, an optional
/// `cashdesk.{toml,yaml,json}` in the working directory, `CASHDESK_*`
/// environment variables, then command-line overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    /// IANA name of the organization timezone
    pub timezone: String,
    /// Local `HH:MM` at which the daily sweep runs
    pub sweep_at: String,
    pub sweep_enabled: bool,
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub timezone: Option<String>,
    pub sweep_enabled: Option<bool>,
}

impl AppConfig {
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(Environment::with_prefix("CASHDESK"), overrides)
    }

    fn load_from(env: Environment, overrides: ConfigOverrides) -> Result<Self> {
        let config: AppConfig = Config::builder()
            .set_default("database_url", "sqlite://cashdesk.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("timezone", "America/Bogota")?
            .set_default("sweep_at", "00:05")?
            .set_default("sweep_enabled", true)?
            .add_source(File::with_name("cashdesk").required(false))
            .add_source(env)
            .set_override_option("database_url", overrides.database_url)?
            .set_override_option("bind_address", overrides.bind_address)?
            .set_override_option("timezone", overrides.timezone)?
            .set_override_option("sweep_enabled", overrides.sweep_enabled)?
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;

        // Fail early on values that only get parsed later
        config.tz()?;
        config.sweep_time()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn tz(&self) -> Result<Tz> {
        Ok(parse_timezone(&self.timezone)?)
    }

    pub fn sweep_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.sweep_at, "%H:%M")
            .with_context(|| format!("Invalid sweep_at '{}', expected HH:MM", self.sweep_at))
    }
}

/// Connect to the database, apply pending migrations and build the shared state.
pub async fn initialize_app_state(config: &AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    info!("Running database migrations");
    Migrator::up(&db, None).await?;

    let desk = default_desk(db.clone(), config.tz()?);
    Ok(AppState { db, desk })
}
