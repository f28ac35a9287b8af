use model::entities::principal::{self, Role};
use model::entities::prelude::Principal as PrincipalEntity;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};

use crate::error::Result;

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: i32,
    pub tenant_id: i32,
    pub role: Role,
}

impl Principal {
    pub fn new(id: i32, tenant_id: i32, role: Role) -> Self {
        Self { id, tenant_id, role }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

impl From<&principal::Model> for Principal {
    fn from(model: &principal::Model) -> Self {
        Self::new(model.id, model.tenant_id, model.role)
    }
}

/// Picks the principal that unattended jobs act as for a tenant: the first
/// active owner, otherwise any active principal.
#[instrument(skip(db))]
pub async fn resolve_system_actor<C: ConnectionTrait>(db: &C, tenant_id: i32) -> Result<Option<Principal>> {
    let candidates = PrincipalEntity::find()
        .filter(principal::Column::TenantId.eq(tenant_id))
        .filter(principal::Column::Active.eq(true))
        .order_by_asc(principal::Column::Id)
        .all(db)
        .await?;

    let actor = candidates
        .iter()
        .find(|p| p.role == Role::Owner)
        .or_else(|| candidates.first())
        .map(Principal::from);

    debug!(?actor, "Resolved system actor");
    Ok(actor)
}
