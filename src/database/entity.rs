use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::TenantContext;

/// Identifier types a backend can assign on first insert
pub trait GeneratedId: Sized {
    fn generate(sequence: u64) -> Self;
}

impl GeneratedId for i64 {
    fn generate(sequence: u64) -> Self {
        sequence as i64
    }
}

impl GeneratedId for Uuid {
    fn generate(_sequence: u64) -> Self {
        Uuid::new_v4()
    }
}

/// A persisted business record owned by exactly one tenant.
///
/// Implementors embed an [`EntityMeta`] and expose it; every tenant-scoped
/// operation reads the owner tag through it.
pub trait TenantAwareEntity: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Ord + Hash + Debug + Serialize + Send + Sync + 'static;

    /// Entity name, also the default table name
    const ENTITY: &'static str;

    fn meta(&self) -> &EntityMeta<Self::Id>;

    fn meta_mut(&mut self) -> &mut EntityMeta<Self::Id>;

    fn id(&self) -> Option<&Self::Id> {
        self.meta().id()
    }

    fn tenant_id(&self) -> Option<&str> {
        self.meta().tenant_id()
    }
}

/// Columns shared by every tenant-aware table.
///
/// `tenant_id` can only be written while it is unset, so the owner tag is
/// immutable once a record has been created. `created_by` / `updated_by`
/// record the acting user and are always taken from the context, never from
/// the caller's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta<Id> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
}

impl<Id> Default for EntityMeta<Id> {
    fn default() -> Self {
        Self {
            id: None,
            tenant_id: None,
            created_at: None,
            updated_at: None,
            created_by: None,
            updated_by: None,
        }
    }
}

impl<Id> EntityMeta<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference an existing record by id, e.g. for an update payload
    pub fn with_id(id: Id) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    /// Pre-persist hook: stamp the owner from the ambient context when unset,
    /// and the creation time.
    pub fn on_create(&mut self) {
        if self.tenant_id.is_none() {
            self.tenant_id = Some(TenantContext::creation_tenant());
        }
        let now = Utc::now();
        self.created_at.get_or_insert(now);
        self.updated_at.get_or_insert(now);
    }

    pub(crate) fn assign_id(&mut self, id: Id) {
        self.id = Some(id);
    }

    /// Record `user` as author of this write. `created_by` only survives for
    /// new rows; backends keep the stored value on update.
    pub(crate) fn stamp_actor(&mut self, user: Option<&str>) {
        self.created_by = user.map(str::to_owned);
        self.updated_by = user.map(str::to_owned);
    }

    /// Returns false when an owner is already recorded
    pub(crate) fn stamp_tenant(&mut self, tenant_id: &str) -> bool {
        if self.tenant_id.is_some() {
            return false;
        }
        self.tenant_id = Some(tenant_id.to_owned());
        true
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    /// Carry the creation fields of the stored row into an update
    pub(crate) fn keep_creation(&mut self, stored: &EntityMeta<Id>) {
        if stored.created_at.is_some() {
            self.created_at = stored.created_at;
        }
        self.created_by = stored.created_by.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{TenantIdentity, SYSTEM_TENANT};

    #[test]
    fn on_create_defaults_to_system_without_tenant() {
        TenantContext::clear();
        let mut meta: EntityMeta<i64> = EntityMeta::new();
        meta.on_create();
        assert_eq!(meta.tenant_id(), Some(SYSTEM_TENANT));
        assert!(meta.created_at().is_some());
    }

    #[test]
    fn on_create_uses_bound_tenant_and_never_overwrites() {
        let mut meta: EntityMeta<i64> = EntityMeta::new();
        TenantContext::sync_scope(TenantIdentity::tenant("acme"), || meta.on_create());
        assert_eq!(meta.tenant_id(), Some("acme"));

        TenantContext::sync_scope(TenantIdentity::tenant("globex"), || meta.on_create());
        assert_eq!(meta.tenant_id(), Some("acme"));
        assert!(!meta.stamp_tenant("globex"));
    }

    #[test]
    fn update_keeps_stored_author() {
        let mut stored: EntityMeta<i64> = EntityMeta::with_id(1);
        stored.stamp_actor(Some("ann"));
        stored.touch(Utc::now());

        let mut update: EntityMeta<i64> = EntityMeta::with_id(1);
        update.stamp_actor(Some("bob"));
        update.keep_creation(&stored);

        assert_eq!(update.created_by(), Some("ann"));
        assert_eq!(update.updated_by(), Some("bob"));
        assert_eq!(update.created_at(), stored.created_at());
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let meta: EntityMeta<i64> = EntityMeta::new();
        assert_eq!(serde_json::to_value(&meta).unwrap(), serde_json::json!({}));
    }
}
