use sea_orm::entity::prelude::*;

/// An isolated organization. Financial data never crosses tenant boundaries.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::principal::Entity")]
    Principal,
    #[sea_orm(has_many = "super::cash_session::Entity")]
    CashSession,
}

impl Related<super::principal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl Related<super::cash_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
