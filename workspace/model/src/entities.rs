//! SeaORM entities of the cash engine.
//!
//! Sessions and ledger entries are owned by their tenant. Daily and monthly
//! aggregates are derived caches, and audit events are append-only.

pub mod audit_event;
pub mod cash_session;
pub mod daily_aggregate;
pub mod ledger_entry;
pub mod monthly_aggregate;
pub mod principal;
pub mod tenant;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::audit_event::Entity as AuditEvent;
    pub use super::cash_session::Entity as CashSession;
    pub use super::daily_aggregate::Entity as DailyAggregate;
    pub use super::ledger_entry::Entity as LedgerEntry;
    pub use super::monthly_aggregate::Entity as MonthlyAggregate;
    pub use super::principal::Entity as Principal;
    pub use super::tenant::Entity as Tenant;
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use ledger_entry::{EntryKind, PaymentMethod};
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn seed_tenant(db: &DatabaseConnection, name: &str) -> Result<(tenant::Model, principal::Model), DbErr> {
        let tenant = tenant::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let owner = principal::ActiveModel {
            tenant_id: Set(tenant.id),
            name: Set(format!("{} owner", name)),
            role: Set(principal::Role::Owner),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok((tenant, owner))
    }

    fn session(tenant_id: i32, opened_by: i32, date: &str) -> cash_session::ActiveModel {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        cash_session::ActiveModel {
            tenant_id: Set(tenant_id),
            business_date: Set(Some(date.to_string())),
            timezone: Set("America/Bogota".to_string()),
            opening_balance: Set(Decimal::new(100_000, 0)),
            closing_balance: Set(None),
            is_open: Set(true),
            opened_by: Set(opened_by),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let (clinic, owner) = seed_tenant(&db, "North clinic").await?;

        let register = session(clinic.id, owner.id, "2025-03-01").insert(&db).await?;

        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 16, 30, 0).unwrap();
        let entry = ledger_entry::ActiveModel {
            tenant_id: Set(clinic.id),
            session_id: Set(register.id),
            kind: Set(EntryKind::Income),
            category: Set(Some("Consultation".to_string())),
            description: Set("General consultation".to_string()),
            amount: Set(Decimal::new(50_000, 0)),
            payment_method: Set(PaymentMethod::Card),
            patient_ref: Set(Some("patient-42".to_string())),
            author_id: Set(owner.id),
            created_at: Set(created_at),
            updated_at: Set(created_at),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let stored = LedgerEntry::find_by_id(entry.id).one(&db).await?.expect("entry stored");
        assert_eq!(stored.kind, EntryKind::Income);
        assert_eq!(stored.payment_method, PaymentMethod::Card);
        assert_eq!(stored.amount, Decimal::new(50_000, 0));
        assert_eq!(stored.created_at, created_at);

        let entries = register.find_related(LedgerEntry).all(&db).await?;
        assert_eq!(entries.len(), 1);

        let principals = Principal::find()
            .filter(principal::Column::TenantId.eq(clinic.id))
            .all(&db)
            .await?;
        assert_eq!(principals.len(), 1);
        assert_eq!(principals[0].role, principal::Role::Owner);

        let event = audit_event::ActiveModel {
            tenant_id: Set(clinic.id),
            actor_id: Set(owner.id),
            action: Set("OPEN_SESSION".to_string()),
            detail: Set(serde_json::json!({ "session_id": register.id })),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        let stored_event = AuditEvent::find_by_id(event.id).one(&db).await?.expect("event stored");
        assert_eq!(stored_event.detail["session_id"], register.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_one_session_per_tenant_and_date() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let (clinic, owner) = seed_tenant(&db, "South clinic").await?;
        let (other, other_owner) = seed_tenant(&db, "East clinic").await?;

        session(clinic.id, owner.id, "2025-03-01").insert(&db).await?;

        let duplicate = session(clinic.id, owner.id, "2025-03-01").insert(&db).await;
        let err = duplicate.expect_err("second session for the same day must be rejected");
        assert!(matches!(
            err.sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ));

        // Same date in another tenant and another date in the same tenant are fine
        session(other.id, other_owner.id, "2025-03-01").insert(&db).await?;
        session(clinic.id, owner.id, "2025-03-02").insert(&db).await?;

        // Legacy rows without a business date do not collide with each other
        let mut legacy = session(clinic.id, owner.id, "unused");
        legacy.business_date = Set(None);
        legacy.clone().insert(&db).await?;
        legacy.insert(&db).await?;

        assert_eq!(CashSession::find().all(&db).await?.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_schema_round_trips_on_sqlite() -> Result<(), DbErr> {
        let db = setup_db().await?;

        // The whole schema must be re-creatable on SQLite
        Migrator::down(&db, None).await?;
        Migrator::up(&db, None).await?;

        let (clinic, owner) = seed_tenant(&db, "West clinic").await?;
        let mut register = session(clinic.id, owner.id, "2025-03-01");
        register.opening_balance = Set(Decimal::new(987_654_321, 4));
        let register = register.insert(&db).await?;

        let stored = CashSession::find_by_id(register.id).one(&db).await?.expect("session stored");
        assert_eq!(stored.opening_balance.round_dp(4), Decimal::new(987_654_321, 4));
        Ok(())
    }
}
