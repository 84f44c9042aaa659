use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::tenant::TenantError;

use super::backend::EntityBackend;
use super::entity::{GeneratedId, TenantAwareEntity};
use super::error::StoreError;
use super::scope::Scope;

/// In-process backend keyed by id. Used for tests and local development.
pub struct MemoryBackend<T: TenantAwareEntity> {
    rows: RwLock<BTreeMap<T::Id, T>>,
    sequence: AtomicU64,
    operations: AtomicU64,
}

impl<T: TenantAwareEntity> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
            operations: AtomicU64::new(0),
        }
    }
}

impl<T: TenantAwareEntity> MemoryBackend<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls served so far
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Every stored row, ignoring tenant scope
    pub async fn rows(&self) -> Vec<T> {
        self.rows.read().await.values().cloned().collect()
    }

    fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T> MemoryBackend<T>
where
    T: TenantAwareEntity,
    T::Id: GeneratedId,
{
    fn next_free_id(&self, rows: &BTreeMap<T::Id, T>) -> T::Id {
        loop {
            let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let id = T::Id::generate(next);
            if !rows.contains_key(&id) {
                return id;
            }
        }
    }
}

#[async_trait]
impl<T> EntityBackend<T> for MemoryBackend<T>
where
    T: TenantAwareEntity,
    T::Id: GeneratedId,
{
    async fn find_all(&self, scope: &Scope) -> Result<Vec<T>, StoreError> {
        self.record_operation();
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| scope.admits(row.tenant_id()))
            .cloned()
            .collect())
    }

    async fn find_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<Vec<T>, StoreError> {
        self.record_operation();
        let rows = self.rows.read().await;
        let mut seen = BTreeSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| rows.get(id))
            .filter(|row| scope.admits(row.tenant_id()))
            .cloned()
            .collect())
    }

    async fn count(&self, scope: &Scope) -> Result<u64, StoreError> {
        self.record_operation();
        let rows = self.rows.read().await;
        Ok(rows.values().filter(|row| scope.admits(row.tenant_id())).count() as u64)
    }

    async fn owner_of(&self, id: &T::Id) -> Result<Option<String>, StoreError> {
        self.record_operation();
        let rows = self.rows.read().await;
        Ok(rows
            .get(id)
            .and_then(|row| row.tenant_id().map(str::to_owned)))
    }

    async fn upsert_all(&self, entities: Vec<T>) -> Result<Vec<T>, StoreError> {
        self.record_operation();
        let mut rows = self.rows.write().await;

        for entity in &entities {
            let stored = entity.id().and_then(|id| rows.get(id));
            if let Some(stored) = stored {
                if stored.tenant_id() != entity.tenant_id() {
                    return Err(TenantError::violation(T::ENTITY).into());
                }
            }
        }

        let mut saved = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let stored = entity.id().and_then(|id| rows.get(id)).map(|row| row.meta().clone());
            match stored {
                Some(stored) => entity.meta_mut().keep_creation(&stored),
                None => {
                    // ids of new rows always come from the sequence, never the caller
                    let id = self.next_free_id(&rows);
                    let meta = entity.meta_mut();
                    meta.assign_id(id);
                    meta.on_create();
                }
            }
            if let Some(id) = entity.id().cloned() {
                rows.insert(id, entity.clone());
            }
            saved.push(entity);
        }
        Ok(saved)
    }

    async fn delete_by_ids(&self, ids: &[T::Id], scope: &Scope) -> Result<u64, StoreError> {
        self.record_operation();
        let mut rows = self.rows.write().await;
        let mut removed = 0;
        for id in ids {
            let in_scope = rows.get(id).is_some_and(|row| scope.admits(row.tenant_id()));
            if in_scope {
                rows.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
