use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use super::error::TenantError;
use super::identity::{TenantIdentity, SYSTEM_TENANT};

tokio::task_local! {
    static TASK_IDENTITY: RefCell<TenantIdentity>;
}

thread_local! {
    static THREAD_IDENTITY: RefCell<TenantIdentity> = RefCell::new(TenantIdentity::empty());
}

/// Ambient tenant identity for the currently executing unit of work.
///
/// Inside a [`TenantContext::scope`] the identity lives in tokio task-local
/// storage and follows the task across `.await` points and worker threads.
/// Outside any scope it falls back to thread-local storage, which is only
/// correct when one unit of work owns the OS thread (see [`TenantContext::enter`]).
///
/// Every unit of work must be wrapped in `scope`, `enter` or `sync_scope` so
/// the binding ends on every exit path.
pub struct TenantContext;

impl TenantContext {
    fn with_slot<R>(f: impl FnOnce(&RefCell<TenantIdentity>) -> R) -> R {
        if TASK_IDENTITY.try_with(|_| ()).is_ok() {
            TASK_IDENTITY.with(f)
        } else {
            THREAD_IDENTITY.with(f)
        }
    }

    fn in_task_scope() -> bool {
        TASK_IDENTITY.try_with(|_| ()).is_ok()
    }

    fn warn_unscoped_write() {
        if !Self::in_task_scope() && tokio::runtime::Handle::try_current().is_ok() {
            tracing::warn!(
                "tenant context written outside a task scope on a runtime thread; identity is thread-bound"
            );
        }
    }

    /// Mark the current task as system-admin (or not). Overwrites any prior flag.
    pub fn set_system_context(flag: bool) {
        Self::warn_unscoped_write();
        Self::with_slot(|slot| {
            slot.replace_with(|current| current.clone().with_system(flag));
        });
    }

    pub fn is_system_context() -> bool {
        Self::with_slot(|slot| slot.borrow().is_system())
    }

    /// Bind a concrete tenant. The system flag is left untouched.
    pub fn set_tenant_id(tenant_id: impl Into<String>) {
        Self::warn_unscoped_write();
        let tenant_id = tenant_id.into();
        Self::with_slot(|slot| {
            slot.replace_with(|current| current.clone().with_tenant_id(tenant_id));
        });
    }

    /// Resolve the acting tenant key: `"system"` in system mode, otherwise the
    /// bound tenant id.
    pub fn get_tenant_id() -> Result<String, TenantError> {
        Self::with_slot(|slot| slot.borrow().resolve().map(str::to_owned))
    }

    /// True iff a concrete tenant id is bound, regardless of the system flag
    pub fn has_tenant() -> bool {
        Self::with_slot(|slot| slot.borrow().has_tenant())
    }

    /// Remove both bindings. Calling it with nothing bound is a no-op.
    pub fn clear() {
        Self::with_slot(|slot| {
            slot.replace(TenantIdentity::empty());
        });
    }

    /// Copy of the identity currently bound
    pub fn snapshot() -> TenantIdentity {
        Self::with_slot(|slot| slot.borrow().clone())
    }

    /// Authenticated user acting in this unit of work, if the boundary knows one
    pub fn current_user() -> Option<String> {
        Self::with_slot(|slot| slot.borrow().user().map(str::to_owned))
    }

    /// Owner tag for a record created right now: the resolved tenant when a
    /// tenant is bound, `"system"` otherwise.
    pub fn creation_tenant() -> String {
        Self::with_slot(|slot| {
            let identity = slot.borrow();
            if identity.has_tenant() {
                identity.resolve().unwrap_or(SYSTEM_TENANT).to_owned()
            } else {
                SYSTEM_TENANT.to_owned()
            }
        })
    }

    /// Run `future` with `identity` bound in task-local storage.
    ///
    /// The binding is dropped when the future completes, panics or is
    /// cancelled, so the identity never outlives the unit of work.
    pub fn scope<F>(identity: TenantIdentity, future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        TASK_IDENTITY.scope(RefCell::new(identity), future)
    }

    /// Carry the current identity into work handed to another task.
    pub fn propagate<F>(future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        Self::scope(Self::snapshot(), future)
    }

    /// Run a background job in system-admin mode.
    pub fn run_as_system<F>(future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        Self::scope(TenantIdentity::system(), future)
    }

    /// Bind `identity` for a synchronous unit of work. Dropping the guard puts
    /// back whatever was bound before, so guards nest.
    pub fn enter(identity: TenantIdentity) -> ContextGuard {
        let previous = Self::with_slot(|slot| slot.replace(identity));
        ContextGuard {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }

    /// Run `f` with `identity` bound, restoring the outer binding afterwards
    /// even on panic.
    pub fn sync_scope<R>(identity: TenantIdentity, f: impl FnOnce() -> R) -> R {
        let _guard = Self::enter(identity);
        f()
    }
}

/// Restores the previously bound identity when dropped. Bound to the thread
/// (or task scope) that created it.
#[must_use = "the previous tenant context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<TenantIdentity>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take().unwrap_or_default();
        TenantContext::with_slot(|slot| {
            slot.replace(previous);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_tenant_id_without_binding_fails() {
        TenantContext::clear();
        assert_eq!(
            TenantContext::get_tenant_id(),
            Err(TenantError::MissingTenantIdentity)
        );
        assert!(!TenantContext::has_tenant());
        assert!(!TenantContext::is_system_context());
    }

    #[test]
    fn set_tenant_id_overwrites() {
        let _guard = TenantContext::enter(TenantIdentity::empty());
        TenantContext::set_tenant_id("acme");
        TenantContext::set_tenant_id("globex");
        assert_eq!(TenantContext::get_tenant_id().unwrap(), "globex");
    }

    #[test]
    fn system_flag_wins_but_tenant_stays_bound() {
        let _guard = TenantContext::enter(TenantIdentity::tenant("acme"));
        TenantContext::set_system_context(true);
        assert_eq!(TenantContext::get_tenant_id().unwrap(), SYSTEM_TENANT);
        assert!(TenantContext::has_tenant());

        TenantContext::set_system_context(false);
        assert_eq!(TenantContext::get_tenant_id().unwrap(), "acme");
    }

    #[test]
    fn clear_is_idempotent() {
        TenantContext::set_tenant_id("acme");
        TenantContext::clear();
        TenantContext::clear();
        assert!(!TenantContext::has_tenant());
        assert!(TenantContext::snapshot().is_empty());
    }

    #[test]
    fn creation_tenant_defaults_to_system() {
        TenantContext::clear();
        assert_eq!(TenantContext::creation_tenant(), SYSTEM_TENANT);

        TenantContext::sync_scope(TenantIdentity::tenant("acme"), || {
            assert_eq!(TenantContext::creation_tenant(), "acme");
        });

        TenantContext::sync_scope(TenantIdentity::tenant("acme").with_system(true), || {
            assert_eq!(TenantContext::creation_tenant(), SYSTEM_TENANT);
        });
    }

    #[test]
    fn guard_unbinds_on_panic() {
        let result = std::panic::catch_unwind(|| {
            TenantContext::sync_scope(TenantIdentity::tenant("acme").with_system(true), || {
                panic!("unit of work failed");
            })
        });
        assert!(result.is_err());
        assert!(!TenantContext::has_tenant());
        assert!(!TenantContext::is_system_context());
    }

    #[test]
    fn nested_guards_restore_outer_identity() {
        let outer = TenantContext::enter(TenantIdentity::tenant("acme"));
        {
            let _inner = TenantContext::enter(TenantIdentity::tenant("globex"));
            assert_eq!(TenantContext::get_tenant_id().unwrap(), "globex");
        }
        assert_eq!(TenantContext::get_tenant_id().unwrap(), "acme");

        TenantContext::sync_scope(TenantIdentity::system(), || {
            assert_eq!(TenantContext::get_tenant_id().unwrap(), SYSTEM_TENANT);
        });
        assert_eq!(TenantContext::get_tenant_id().unwrap(), "acme");

        drop(outer);
        assert!(TenantContext::snapshot().is_empty());
    }

    #[test]
    fn nested_guard_restores_outer_identity_after_panic() {
        let _outer = TenantContext::enter(TenantIdentity::tenant("acme"));
        let result = std::panic::catch_unwind(|| {
            TenantContext::sync_scope(TenantIdentity::system(), || panic!("inner work failed"))
        });
        assert!(result.is_err());
        assert_eq!(TenantContext::get_tenant_id().unwrap(), "acme");
        assert!(!TenantContext::is_system_context());
    }

    #[tokio::test]
    async fn sync_scope_inside_task_scope_keeps_task_identity() {
        let seen = TenantContext::scope(TenantIdentity::tenant("acme"), async {
            TenantContext::sync_scope(TenantIdentity::system(), || {
                assert!(TenantContext::is_system_context());
            });
            tokio::task::yield_now().await;
            TenantContext::get_tenant_id()
        })
        .await;

        assert_eq!(seen.unwrap(), "acme");
        assert!(!TenantContext::has_tenant());
    }

    #[tokio::test]
    async fn current_user_follows_the_scope() {
        let identity = TenantIdentity::tenant("acme").with_user("ann");
        let user = TenantContext::scope(identity, async { TenantContext::current_user() }).await;
        assert_eq!(user.as_deref(), Some("ann"));
        assert_eq!(TenantContext::current_user(), None);
    }

    #[tokio::test]
    async fn scope_binding_survives_await_and_ends_with_scope() {
        let seen = TenantContext::scope(TenantIdentity::tenant("acme"), async {
            tokio::task::yield_now().await;
            TenantContext::get_tenant_id()
        })
        .await;

        assert_eq!(seen.unwrap(), "acme");
        assert!(!TenantContext::has_tenant());
    }

    #[tokio::test]
    async fn writes_inside_scope_stay_inside_scope() {
        TenantContext::scope(TenantIdentity::empty(), async {
            TenantContext::set_tenant_id("acme");
            TenantContext::set_system_context(true);
            assert!(TenantContext::is_system_context());
        })
        .await;

        assert!(!TenantContext::has_tenant());
        assert!(!TenantContext::is_system_context());
    }

    #[tokio::test]
    async fn spawned_task_does_not_inherit_without_propagation() {
        TenantContext::scope(TenantIdentity::tenant("acme"), async {
            let bare = tokio::spawn(async { TenantContext::has_tenant() })
                .await
                .unwrap();
            assert!(!bare);

            let carried = tokio::spawn(TenantContext::propagate(async {
                TenantContext::get_tenant_id()
            }))
            .await
            .unwrap();
            assert_eq!(carried.unwrap(), "acme");
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_scopes_are_isolated() {
        let handles: Vec<_> = (0..32)
            .map(|n| {
                let tenant = format!("tenant-{n}");
                tokio::spawn(TenantContext::scope(
                    TenantIdentity::tenant(tenant.clone()),
                    async move {
                        for _ in 0..10 {
                            tokio::task::yield_now().await;
                            assert_eq!(TenantContext::get_tenant_id().unwrap(), tenant);
                        }
                    },
                ))
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn run_as_system_resolves_system() {
        let resolved = TenantContext::run_as_system(async { TenantContext::get_tenant_id() }).await;
        assert_eq!(resolved.unwrap(), SYSTEM_TENANT);
    }
}
