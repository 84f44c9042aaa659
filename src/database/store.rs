use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::tenant::{TenantContext, TenantError};

use super::backend::EntityBackend;
use super::entity::TenantAwareEntity;
use super::error::StoreError;
use super::scope::Scope;

/// Tenant-scoped data access for one entity type.
///
/// Every operation recomputes the [`Scope`] from the tenant context at call
/// time and applies it before touching the backend. Reads never reveal rows
/// owned by another tenant; writes and deletes against them fail with
/// [`TenantError::TenantIsolationViolation`] before anything is mutated.
///
/// The store holds no per-call state and is cheap to clone and share.
pub struct TenantScopedStore<T: TenantAwareEntity> {
    backend: Arc<dyn EntityBackend<T>>,
}

impl<T: TenantAwareEntity> Clone for TenantScopedStore<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<T: TenantAwareEntity> TenantScopedStore<T> {
    pub fn new(backend: impl EntityBackend<T> + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn EntityBackend<T>>) -> Self {
        Self { backend }
    }

    fn scope(&self, operation: &'static str) -> Result<Scope, StoreError> {
        let scope = Scope::current().map_err(|e| {
            warn!(entity = T::ENTITY, operation, "no tenant identity bound for data access");
            e
        })?;
        debug!(entity = T::ENTITY, operation, scope = ?scope, "tenant scope resolved");
        Ok(scope)
    }

    fn violation(&self, scope: &Scope, operation: &'static str) -> StoreError {
        warn!(
            entity = T::ENTITY,
            operation,
            acting_tenant = scope.acting_tenant(),
            "tenant isolation violation rejected"
        );
        TenantError::violation(T::ENTITY).into()
    }

    /// All rows visible to the acting tenant. Order is unspecified.
    pub async fn find_all(&self) -> Result<Vec<T>, StoreError> {
        let scope = self.scope("find_all")?;
        self.backend.find_all(&scope).await
    }

    /// The row with `id` if it exists and is visible. A row owned by another
    /// tenant is reported as absent.
    pub async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, StoreError> {
        let scope = self.scope("find_by_id")?;
        let mut found = self
            .backend
            .find_by_ids(std::slice::from_ref(id), &scope)
            .await?;
        Ok(found.pop())
    }

    /// Visible rows among `ids`; the rest are silently omitted.
    pub async fn find_all_by_id<I>(&self, ids: I) -> Result<Vec<T>, StoreError>
    where
        I: IntoIterator<Item = T::Id>,
    {
        let scope = self.scope("find_all_by_id")?;
        let ids: Vec<T::Id> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.backend.find_by_ids(&ids, &scope).await
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let scope = self.scope("count")?;
        self.backend.count(&scope).await
    }

    pub async fn exists_by_id(&self, id: &T::Id) -> Result<bool, StoreError> {
        let scope = self.scope("exists_by_id")?;
        self.backend.exists(id, &scope).await
    }

    /// Delete the row if visible; a foreign id is a silent no-op.
    pub async fn delete_by_id(&self, id: &T::Id) -> Result<(), StoreError> {
        let scope = self.scope("delete_by_id")?;
        self.backend
            .delete_by_ids(std::slice::from_ref(id), &scope)
            .await?;
        Ok(())
    }

    pub async fn delete_all_by_id<I>(&self, ids: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = T::Id>,
    {
        let scope = self.scope("delete_all_by_id")?;
        let ids: Vec<T::Id> = ids.into_iter().collect();
        if ids.is_empty() {
            return Ok(());
        }
        let removed = self.backend.delete_by_ids(&ids, &scope).await?;
        debug!(entity = T::ENTITY, requested = ids.len(), removed, "delete_all_by_id");
        Ok(())
    }

    /// Delete `entity` after checking it is owned by the acting tenant.
    pub async fn delete(&self, entity: &T) -> Result<(), StoreError> {
        let scope = self.scope("delete")?;
        if !scope.admits(entity.tenant_id()) {
            return Err(self.violation(&scope, "delete"));
        }
        if let Some(id) = entity.id() {
            self.backend
                .delete_by_ids(std::slice::from_ref(id), &scope)
                .await?;
        }
        Ok(())
    }

    /// Stamp the owner on `entity` and persist it (insert, or update by id).
    pub async fn save(&self, entity: T) -> Result<T, StoreError> {
        let scope = self.scope("save")?;
        let prepared = self.prepare(entity, &scope, "save").await?;
        let mut saved = self.backend.upsert_all(vec![prepared]).await?;
        saved
            .pop()
            .ok_or_else(|| StoreError::Backend(format!("{} upsert returned no row", T::ENTITY)))
    }

    /// Save every entity or none: all entities are checked before the backend
    /// writes the batch in one atomic step.
    pub async fn save_all<I>(&self, entities: I) -> Result<Vec<T>, StoreError>
    where
        I: IntoIterator<Item = T>,
    {
        let scope = self.scope("save_all")?;
        let mut prepared = Vec::new();
        for entity in entities {
            prepared.push(self.prepare(entity, &scope, "save_all").await?);
        }
        if prepared.is_empty() {
            return Ok(vec![]);
        }
        self.backend.upsert_all(prepared).await
    }

    async fn prepare(&self, mut entity: T, scope: &Scope, operation: &'static str) -> Result<T, StoreError> {
        if entity.tenant_id().is_some() && !scope.admits(entity.tenant_id()) {
            return Err(self.violation(scope, operation));
        }

        let stored_owner = match entity.id() {
            Some(id) => self.backend.owner_of(id).await?,
            None => None,
        };

        if let Some(owner) = stored_owner.as_deref() {
            if !scope.admits(Some(owner)) {
                return Err(self.violation(scope, operation));
            }
            // the owner tag is immutable, even in system mode
            if entity.tenant_id().is_some_and(|tenant| tenant != owner) {
                return Err(self.violation(scope, operation));
            }
        }

        let owner = stored_owner.unwrap_or_else(|| scope.acting_tenant().to_owned());
        let meta = entity.meta_mut();
        meta.stamp_tenant(&owner);
        meta.stamp_actor(TenantContext::current_user().as_deref());
        meta.touch(Utc::now());
        Ok(entity)
    }
}
