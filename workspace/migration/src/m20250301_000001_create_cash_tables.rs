use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tenants table
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(pk_auto(Tenants::Id))
                    .col(string(Tenants::Name))
                    .col(timestamp_with_time_zone(Tenants::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create principals table
        manager
            .create_table(
                Table::create()
                    .table(Principals::Table)
                    .if_not_exists()
                    .col(pk_auto(Principals::Id))
                    .col(integer(Principals::TenantId))
                    .col(string(Principals::Name))
                    .col(string_len(Principals::Role, 16))
                    .col(boolean(Principals::Active).default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_principal_tenant")
                            .from(Principals::Table, Principals::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create cash_sessions table
        manager
            .create_table(
                Table::create()
                    .table(CashSessions::Table)
                    .if_not_exists()
                    .col(pk_auto(CashSessions::Id))
                    .col(integer(CashSessions::TenantId))
                    .col(string_len_null(CashSessions::BusinessDate, 10))
                    .col(string(CashSessions::Timezone))
                    .col(decimal_len(CashSessions::OpeningBalance, 16, 4))
                    .col(decimal_len_null(CashSessions::ClosingBalance, 16, 4))
                    .col(boolean(CashSessions::IsOpen).default(true))
                    .col(integer(CashSessions::OpenedBy))
                    .col(timestamp_with_time_zone(CashSessions::CreatedAt))
                    .col(timestamp_with_time_zone(CashSessions::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_session_tenant")
                            .from(CashSessions::Table, CashSessions::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One register per tenant and business day. Concurrent opens are decided here.
        manager
            .create_index(
                Index::create()
                    .name("idx_cash_sessions_tenant_business_date")
                    .table(CashSessions::Table)
                    .col(CashSessions::TenantId)
                    .col(CashSessions::BusinessDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cash_sessions_tenant_open")
                    .table(CashSessions::Table)
                    .col(CashSessions::TenantId)
                    .col(CashSessions::IsOpen)
                    .to_owned(),
            )
            .await?;

        // Create ledger_entries table
        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(pk_auto(LedgerEntries::Id))
                    .col(integer(LedgerEntries::TenantId))
                    .col(integer(LedgerEntries::SessionId))
                    .col(string_len(LedgerEntries::Kind, 16))
                    .col(string_null(LedgerEntries::Category))
                    .col(string(LedgerEntries::Description))
                    .col(decimal_len(LedgerEntries::Amount, 16, 4))
                    .col(string_len(LedgerEntries::PaymentMethod, 16))
                    .col(string_null(LedgerEntries::PatientRef))
                    .col(integer(LedgerEntries::AuthorId))
                    .col(timestamp_with_time_zone(LedgerEntries::CreatedAt))
                    .col(timestamp_with_time_zone(LedgerEntries::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledger_entry_session")
                            .from(LedgerEntries::Table, LedgerEntries::SessionId)
                            .to(CashSessions::Table, CashSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ledger_entry_tenant")
                            .from(LedgerEntries::Table, LedgerEntries::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ledger_entries_tenant_created_at")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::TenantId)
                    .col(LedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create daily_aggregates table
        manager
            .create_table(
                Table::create()
                    .table(DailyAggregates::Table)
                    .if_not_exists()
                    .col(pk_auto(DailyAggregates::Id))
                    .col(integer(DailyAggregates::TenantId))
                    .col(string_len(DailyAggregates::BusinessDate, 10))
                    .col(string(DailyAggregates::Timezone))
                    .col(decimal_len(DailyAggregates::OpeningBalance, 16, 4))
                    .col(decimal_len(DailyAggregates::TotalIncome, 16, 4))
                    .col(decimal_len(DailyAggregates::TotalExpense, 16, 4))
                    .col(decimal_len(DailyAggregates::ClosingBalance, 16, 4))
                    .col(integer_null(DailyAggregates::CreatedBy))
                    .col(timestamp_with_time_zone(DailyAggregates::RecomputedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_daily_aggregate_tenant")
                            .from(DailyAggregates::Table, DailyAggregates::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_daily_aggregates_tenant_business_date")
                    .table(DailyAggregates::Table)
                    .col(DailyAggregates::TenantId)
                    .col(DailyAggregates::BusinessDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create monthly_aggregates table
        manager
            .create_table(
                Table::create()
                    .table(MonthlyAggregates::Table)
                    .if_not_exists()
                    .col(pk_auto(MonthlyAggregates::Id))
                    .col(integer(MonthlyAggregates::TenantId))
                    .col(integer(MonthlyAggregates::Year))
                    .col(integer(MonthlyAggregates::Month))
                    .col(decimal_len(MonthlyAggregates::TotalIncome, 16, 4))
                    .col(decimal_len(MonthlyAggregates::TotalExpense, 16, 4))
                    .col(decimal_len(MonthlyAggregates::OpeningBalance, 16, 4))
                    .col(decimal_len(MonthlyAggregates::ClosingBalance, 16, 4))
                    .col(integer(MonthlyAggregates::CreatedBy))
                    .col(timestamp_with_time_zone(MonthlyAggregates::RecomputedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_aggregate_tenant")
                            .from(MonthlyAggregates::Table, MonthlyAggregates::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_aggregates_tenant_year_month")
                    .table(MonthlyAggregates::Table)
                    .col(MonthlyAggregates::TenantId)
                    .col(MonthlyAggregates::Year)
                    .col(MonthlyAggregates::Month)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create audit_events table
        manager
            .create_table(
                Table::create()
                    .table(AuditEvents::Table)
                    .if_not_exists()
                    .col(pk_auto(AuditEvents::Id))
                    .col(integer(AuditEvents::TenantId))
                    .col(integer(AuditEvents::ActorId))
                    .col(string(AuditEvents::Action))
                    .col(json(AuditEvents::Detail))
                    .col(timestamp_with_time_zone(AuditEvents::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_events_tenant_created_at")
                    .table(AuditEvents::Table)
                    .col(AuditEvents::TenantId)
                    .col(AuditEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to respect foreign key constraints
        manager
            .drop_table(Table::drop().table(AuditEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonthlyAggregates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyAggregates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CashSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Principals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Principals {
    Table,
    Id,
    TenantId,
    Name,
    Role,
    Active,
}

#[derive(DeriveIden)]
enum CashSessions {
    Table,
    Id,
    TenantId,
    BusinessDate,
    Timezone,
    OpeningBalance,
    ClosingBalance,
    IsOpen,
    OpenedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LedgerEntries {
    Table,
    Id,
    TenantId,
    SessionId,
    Kind,
    Category,
    Description,
    Amount,
    PaymentMethod,
    PatientRef,
    AuthorId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DailyAggregates {
    Table,
    Id,
    TenantId,
    BusinessDate,
    Timezone,
    OpeningBalance,
    TotalIncome,
    TotalExpense,
    ClosingBalance,
    CreatedBy,
    RecomputedAt,
}

#[derive(DeriveIden)]
enum MonthlyAggregates {
    Table,
    Id,
    TenantId,
    Year,
    Month,
    TotalIncome,
    TotalExpense,
    OpeningBalance,
    ClosingBalance,
    CreatedBy,
    RecomputedAt,
}

#[derive(DeriveIden)]
enum AuditEvents {
    Table,
    Id,
    TenantId,
    ActorId,
    Action,
    Detail,
    CreatedAt,
}
