use sea_orm::entity::prelude::*;

use super::tenant;

/// Role of a principal inside its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    /// Organization owner; may edit any ledger entry of the tenant.
    #[sea_orm(string_value = "owner")]
    Owner,
    #[sea_orm(string_value = "assistant")]
    Assistant,
    #[sea_orm(string_value = "professional")]
    Professional,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Assistant => "assistant",
            Role::Professional => "professional",
        }
    }

    /// Parses the lowercase wire name of a role.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "assistant" => Some(Role::Assistant),
            "professional" => Some(Role::Professional),
            _ => None,
        }
    }
}

/// A user known to the back-office. Only the fields the cash engine needs are
/// stored here; authentication lives upstream.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "principals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub name: String,
    pub role: Role,
    #[sea_orm(default_value = "true")]
    pub active: bool,
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
