#[cfg(test)]
pub mod test_utils {
    use crate::auth::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER, TENANT_ID_HEADER};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::http::{HeaderName, HeaderValue};
    use axum::Router;
    use axum_test::{TestRequest, TestServer};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use compute::business_day::{BusinessCalendar, FixedClock};
    use compute::identity::Principal;
    use compute::CashDesk;
    use migration::{Migrator, MigratorTrait};
    use model::entities::principal::{self, Role};
    use model::entities::tenant;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use std::sync::Arc;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        init_test_tracing();
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Log to the test writer; the level comes from RUST_LOG, WARN otherwise.
    pub fn init_test_tracing() {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| level.parse::<tracing::Level>().ok())
            .unwrap_or(tracing::Level::WARN);
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(log_level)
            .try_init();
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

    /// Everything a test needs: a desk pinned to 2025-03-01 09:00 in Bogota,
    /// one clinic with an owner and two assistants, and a second clinic.
    pub struct TestContext {
        pub db: DatabaseConnection,
        pub desk: CashDesk,
        pub clock: Arc<FixedClock>,
        pub owner: Principal,
        pub assistant: Principal,
        pub other_assistant: Principal,
        pub foreign_owner: Principal,
    }

    impl TestContext {
        pub fn state(&self) -> AppState {
            AppState {
                db: self.db.clone(),
                desk: self.desk.clone(),
            }
        }

        pub fn router(&self) -> Router {
            create_router(self.state())
        }

        pub fn server(&self) -> TestServer {
            TestServer::new(self.router()).expect("Failed to start test server")
        }
    }

    async fn new_tenant(db: &DatabaseConnection, name: &str) -> tenant::Model {
        tenant::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create tenant")
    }

    async fn new_principal(db: &DatabaseConnection, tenant: &tenant::Model, name: &str, role: Role) -> Principal {
        let model = principal::ActiveModel {
            tenant_id: Set(tenant.id),
            name: Set(name.to_string()),
            role: Set(role),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create principal");
        Principal::from(&model)
    }

    pub async fn setup_test_context() -> TestContext {
        let db = setup_test_db().await;

        let clinic = new_tenant(&db, "Clinica Norte").await;
        let owner = new_principal(&db, &clinic, "owner", Role::Owner).await;
        let assistant = new_principal(&db, &clinic, "assistant", Role::Assistant).await;
        let other_assistant = new_principal(&db, &clinic, "other assistant", Role::Assistant).await;

        let other_clinic = new_tenant(&db, "Clinica Sur").await;
        let foreign_owner = new_principal(&db, &other_clinic, "foreign owner", Role::Owner).await;

        let clock = Arc::new(FixedClock::new(at_bogota(2025, 3, 1, 9, 0)));
        let calendar = BusinessCalendar::new(chrono_tz::America::Bogota, clock.clone());
        let desk = CashDesk::new(db.clone(), calendar);

        TestContext {
            db,
            desk,
            clock,
            owner,
            assistant,
            other_assistant,
            foreign_owner,
        }
    }

    /// Router over a fresh context, for tests that only need HTTP access.
    pub async fn setup_test_app() -> Router {
        setup_test_context().await.router()
    }

    /// Attach the gateway identity headers of `principal`.
    pub fn as_principal(request: TestRequest, principal: &Principal) -> TestRequest {
        request
            .add_header(
                HeaderName::from_static(PRINCIPAL_ID_HEADER),
                HeaderValue::from(principal.id),
            )
            .add_header(
                HeaderName::from_static(TENANT_ID_HEADER),
                HeaderValue::from(principal.tenant_id),
            )
            .add_header(
                HeaderName::from_static(PRINCIPAL_ROLE_HEADER),
                HeaderValue::from_static(principal.role.as_str()),
            )
    }
}
