use async_trait::async_trait;

use super::entity::TenantAwareEntity;
use super::error::StoreError;
use super::scope::Scope;

/// Persistence boundary behind [`TenantScopedStore`](super::store::TenantScopedStore).
///
/// Every read and delete receives the scoping predicate and must apply it.
/// `owner_of` is the only unscoped lookup and exists solely so writes can be
/// checked against the stored owner.
#[async_trait]
pub trait EntityBackend<T: TenantAwareEntity>: Send + Sync {
    async fn find_all(&self, scope: &Scope) -> Result<Vec<T>, StoreError>;

    async fn find_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<Vec<T>, StoreError>;

    async fn count(&self, scope: &Scope) -> Result<u64, StoreError>;

    async fn exists(&self, id: &T::Id, scope: &Scope) -> Result<bool, StoreError> {
        let found = self.find_by_ids(std::slice::from_ref(id), scope).await?;
        Ok(!found.is_empty())
    }

    async fn owner_of(&self, id: &T::Id) -> Result<Option<String>, StoreError>;

    /// Insert or update every entity in one atomic step. An entity whose id
    /// is stored under a different owner fails the whole batch.
    async fn upsert_all(&self, entities: Vec<T>) -> Result<Vec<T>, StoreError>;

    /// Delete in-scope rows among `ids`, returning how many were removed
    async fn delete_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<u64, StoreError>;
}
