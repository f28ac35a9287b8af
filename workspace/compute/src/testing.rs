//! Shared fixtures for the engine tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::principal::{self, Role};
use model::entities::tenant;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

use crate::business_day::{BusinessCalendar, FixedClock};
use crate::identity::Principal;
use crate::CashDesk;

pub async fn setup_db() -> DatabaseConnection {
    init_test_tracing();
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub async fn new_tenant(db: &DatabaseConnection, name: &str) -> tenant::Model {
    tenant::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create tenant")
}

pub async fn new_principal(db: &DatabaseConnection, tenant: &tenant::Model, role: Role) -> Principal {
    static PRINCIPAL_ID: AtomicU64 = AtomicU64::new(0);
    let current_id = PRINCIPAL_ID.fetch_add(1, Ordering::SeqCst);

    let model = principal::ActiveModel {
        tenant_id: Set(tenant.id),
        name: Set(format!("{} {}", role.as_str(), current_id)),
        role: Set(role),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create principal");
    Principal::from(&model)
}

/// Desk in America/Bogota with a clock pinned at `now`.
pub fn desk_at(db: &DatabaseConnection, now: DateTime<Utc>) -> (CashDesk, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let calendar = BusinessCalendar::new(chrono_tz::America::Bogota, clock.clone());
    (CashDesk::new(db.clone(), calendar), clock)
}

/// UTC instant of a Bogota wall-clock time.
pub fn at_bogota(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let local = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid local time");
    chrono_tz::America::Bogota
        .from_local_datetime(&local)
        .single()
        .expect("Bogota has no DST")
        .with_timezone(&Utc)
}

pub fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}
