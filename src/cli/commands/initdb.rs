use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

use crate::config::{AppConfig, ConfigOverrides};

pub async fn init_database(overrides: ConfigOverrides) -> Result<()> {
    trace!("Entering init_database function");
    let config = AppConfig::load(overrides)?;
    info!("Initializing database");
    debug!("Database URL: {}", config.database_url);

    let db: DatabaseConnection = match Database::connect(&config.database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", config.database_url, e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }

    info!("Database initialization completed successfully!");
    Ok(())
}
