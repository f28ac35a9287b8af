use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::tenant;

/// Cached roll-up of the daily aggregates of one calendar month.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "monthly_aggregates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub year: i32,
    /// 1 = January, 12 = December.
    pub month: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_income: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_expense: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub opening_balance: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub closing_balance: Decimal,
    pub created_by: i32,
    pub recomputed_at: DateTimeUtc,
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
}

impl Related<tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
