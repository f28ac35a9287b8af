use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::{ledger_entry, tenant};

/// One cash register for one tenant on one business day.
///
/// `(tenant_id, business_date)` is unique. Rows written before the business
/// date existed carry `NULL` there until the legacy repair backfills them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cash_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    /// Canonical `YYYY-MM-DD` in the organization timezone.
    pub business_date: Option<String>,
    /// IANA name of the timezone the business date was resolved in.
    pub timezone: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub opening_balance: Decimal,
    /// Set when the session is closed.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub closing_balance: Option<Decimal>,
    #[sea_orm(default_value = "true")]
    pub is_open: bool,
    pub opened_by: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "tenant::Entity",
        from = "Column::TenantId",
        to = "tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
    #[sea_orm(has_many = "ledger_entry::Entity")]
    LedgerEntry,
}

impl Related<tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
