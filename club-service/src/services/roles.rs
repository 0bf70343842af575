//! Roles and their exclusive holders.
//!
//! Every change is applied to the identity provider first. Local state is only
//! written once the provider accepted the change, so a provider failure leaves
//! nothing behind. Holder changes are serialized per role, and the local
//! election write is retried if it fails after the provider call succeeded.

use super::elections::ElectionLedger;
use super::identity::IdentityProvider;
use super::store::{PartyStore, RoleStore};
use super::ServiceError;
use crate::models::{Election, NewRole, Role};
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use service_core::retry::{retry_async, RetryConfig};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument};
use uuid::Uuid;

/// One async mutex per role id.
#[derive(Debug, Clone, Default)]
pub struct RoleLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl RoleLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, role_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(role_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop the lock of a role that no longer exists. Callers still waiting on
    /// it re-read the role once they get the guard.
    pub fn forget(&self, role_id: Uuid) {
        self.locks.remove(&role_id);
    }
}

#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    parties: Arc<dyn PartyStore>,
    ledger: ElectionLedger,
    identity: Arc<dyn IdentityProvider>,
    locks: RoleLocks,
    retry: RetryConfig,
}

impl RoleService {
    pub fn new(
        roles: Arc<dyn RoleStore>,
        parties: Arc<dyn PartyStore>,
        ledger: ElectionLedger,
        identity: Arc<dyn IdentityProvider>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            roles,
            parties,
            ledger,
            identity,
            locks: RoleLocks::new(),
            retry,
        }
    }

    #[instrument(skip(self, role), fields(name = %role.name))]
    pub async fn create_role(&self, role: NewRole) -> Result<Role, ServiceError> {
        if role.name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Role name must not be empty".to_string(),
            ));
        }

        self.identity.create_role(&role.name).await?;
        for permission in &role.permissions {
            self.identity.add_permission(&role.name, permission).await?;
        }

        let role = self.roles.insert_role(role).await?;
        info!(role_id = %role.role_id, "Role created");
        Ok(role)
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<Role, ServiceError> {
        self.roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        self.roles.list_roles().await
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    pub async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(role_id).await;
        let role = self.get_role(role_id).await?;

        self.identity.delete_role(&role.name).await?;
        self.roles.delete_role(role_id).await?;
        self.locks.forget(role_id);
        info!(name = %role.name, "Role deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    pub async fn add_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Role, ServiceError> {
        let role = self.get_role(role_id).await?;
        self.identity.add_permission(&role.name, permission).await?;
        self.roles
            .add_permission(role_id, permission)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    pub async fn remove_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Role, ServiceError> {
        let role = self.get_role(role_id).await?;
        self.identity
            .remove_permission(&role.name, permission)
            .await?;
        self.roles
            .remove_permission(role_id, permission)
            .await?
            .ok_or_else(|| ServiceError::not_found("Role", role_id))
    }

    pub async fn set_holder(&self, role_id: Uuid, member_id: Uuid) -> Result<(), ServiceError> {
        self.set_holder_on(role_id, member_id, Utc::now().date_naive())
            .await
    }

    #[instrument(skip(self), fields(role_id = %role_id, member_id = %member_id))]
    pub async fn set_holder_on(
        &self,
        role_id: Uuid,
        member_id: Uuid,
        on: NaiveDate,
    ) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(role_id).await;
        let role = self.get_role(role_id).await?;
        let member = self
            .parties
            .find_member(member_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member", member_id))?;

        self.identity
            .assign_role_exclusively(&member.subject, &role.name)
            .await?;

        retry_async(&self.retry, "elect", ServiceError::is_transient, || {
            self.ledger.elect_on(role_id, member_id, on)
        })
        .await?;

        info!(name = %role.name, "Role holder set");
        Ok(())
    }

    pub async fn remove_holder(&self, role_id: Uuid) -> Result<(), ServiceError> {
        self.remove_holder_on(role_id, Utc::now().date_naive()).await
    }

    #[instrument(skip(self), fields(role_id = %role_id))]
    pub async fn remove_holder_on(&self, role_id: Uuid, on: NaiveDate) -> Result<(), ServiceError> {
        let _guard = self.locks.acquire(role_id).await;
        let role = self.get_role(role_id).await?;

        self.identity.unassign_exclusive_role(&role.name).await?;

        retry_async(&self.retry, "finish", ServiceError::is_transient, || {
            self.ledger.finish_on(role_id, on)
        })
        .await?;

        info!(name = %role.name, "Role holder removed");
        Ok(())
    }

    pub async fn elections(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError> {
        self.get_role(role_id).await?;
        self.ledger.history(role_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Member, NewRole};
    use crate::services::identity::{IdentityCall, MockIdentityProvider};
    use crate::services::store::{ElectionStore, TermChange};
    use crate::services::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Election store that fails the next `n` term writes.
    struct FlakyElections {
        inner: Arc<MemoryStore>,
        failures: AtomicU32,
        transient: AtomicBool,
        writes: AtomicU32,
    }

    impl FlakyElections {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                failures: AtomicU32::new(0),
                transient: AtomicBool::new(true),
                writes: AtomicU32::new(0),
            }
        }

        fn fail_next(&self, n: u32, transient: bool) {
            self.transient.store(transient, Ordering::SeqCst);
            self.failures.store(n, Ordering::SeqCst);
            self.writes.store(0, Ordering::SeqCst);
        }

        fn writes(&self) -> u32 {
            self.writes.load(Ordering::SeqCst)
        }

        fn attempt(&self, role_id: Uuid) -> Result<(), ServiceError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining == 0 {
                return Ok(());
            }
            self.failures.store(remaining - 1, Ordering::SeqCst);
            if self.transient.load(Ordering::SeqCst) {
                Err(ServiceError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Err(ServiceError::not_found("Role", role_id))
            }
        }
    }

    #[async_trait]
    impl ElectionStore for FlakyElections {
        async fn open_term(
            &self,
            role_id: Uuid,
            member_id: Uuid,
            on: NaiveDate,
        ) -> Result<TermChange, ServiceError> {
            self.attempt(role_id)?;
            self.inner.open_term(role_id, member_id, on).await
        }

        async fn close_term(
            &self,
            role_id: Uuid,
            on: NaiveDate,
        ) -> Result<Option<Election>, ServiceError> {
            self.attempt(role_id)?;
            self.inner.close_term(role_id, on).await
        }

        async fn find_open_term(&self, role_id: Uuid) -> Result<Option<Election>, ServiceError> {
            self.inner.find_open_term(role_id).await
        }

        async fn list_terms(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError> {
            self.inner.list_terms(role_id).await
        }
    }

    struct Fixture {
        service: RoleService,
        store: Arc<MemoryStore>,
        elections: Arc<FlakyElections>,
        identity: Arc<MockIdentityProvider>,
        role: Role,
        member: Member,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let elections = Arc::new(FlakyElections::new(store.clone()));
            let identity = Arc::new(MockIdentityProvider::new());
            let retry = RetryConfig {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                ..Default::default()
            };
            let service = RoleService::new(
                store.clone(),
                store.clone(),
                ElectionLedger::new(elections.clone()),
                identity.clone(),
                retry,
            );
            let role = service
                .create_role(NewRole {
                    name: "Treasurer".to_string(),
                    permissions: Default::default(),
                })
                .await
                .unwrap();
            let member = store.insert_member("Marla", "Singer", "sub-marla");

            Self {
                service,
                store,
                elections,
                identity,
                role,
                member,
            }
        }

        fn assign_calls(&self) -> usize {
            self.identity
                .calls()
                .iter()
                .filter(|c| matches!(c, IdentityCall::AssignExclusive { .. }))
                .count()
        }

        fn unassign_calls(&self) -> usize {
            self.identity
                .calls()
                .iter()
                .filter(|c| matches!(c, IdentityCall::UnassignExclusive(_)))
                .count()
        }

        async fn open_terms(&self) -> usize {
            self.store
                .list_terms(self.role.role_id)
                .await
                .unwrap()
                .iter()
                .filter(|t| t.valid_to.is_none())
                .count()
        }
    }

    #[tokio::test]
    async fn locks_are_per_role() {
        let locks = RoleLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _held = locks.acquire(a).await;
        // A different role is not blocked.
        let _other = locks.acquire(b).await;

        let locks_clone = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks_clone.acquire(a).await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(_held);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn set_holder_retries_transient_election_failure() {
        let fx = Fixture::new().await;
        fx.elections.fail_next(1, true);

        fx.service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap();

        assert_eq!(fx.elections.writes(), 2);
        assert_eq!(fx.assign_calls(), 1);
        assert_eq!(fx.open_terms().await, 1);
        assert_eq!(
            fx.service.get_role(fx.role.role_id).await.unwrap().holder_member_id,
            Some(fx.member.member_id)
        );
    }

    #[tokio::test]
    async fn set_holder_does_not_retry_permanent_failure() {
        let fx = Fixture::new().await;
        fx.elections.fail_next(1, false);

        let err = fx
            .service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(fx.elections.writes(), 1);
        assert_eq!(fx.assign_calls(), 1);
        assert_eq!(fx.open_terms().await, 0);
    }

    #[tokio::test]
    async fn remove_holder_retries_transient_election_failure() {
        let fx = Fixture::new().await;
        fx.service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap();
        fx.elections.fail_next(2, true);

        fx.service.remove_holder(fx.role.role_id).await.unwrap();

        assert_eq!(fx.elections.writes(), 3);
        assert_eq!(fx.unassign_calls(), 1);
        assert_eq!(fx.open_terms().await, 0);
        assert_eq!(fx.store.list_terms(fx.role.role_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_holder_does_not_retry_permanent_failure() {
        let fx = Fixture::new().await;
        fx.service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap();
        fx.elections.fail_next(1, false);

        let err = fx.service.remove_holder(fx.role.role_id).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(fx.elections.writes(), 1);
        assert_eq!(fx.unassign_calls(), 1);
        assert_eq!(fx.open_terms().await, 1);
    }

    #[tokio::test]
    async fn retries_stop_after_the_configured_attempts() {
        let fx = Fixture::new().await;
        fx.elections.fail_next(10, true);

        let err = fx
            .service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(fx.elections.writes(), 4);
        assert_eq!(fx.assign_calls(), 1);
        assert_eq!(fx.open_terms().await, 0);
    }

    #[tokio::test]
    async fn deleting_a_role_drops_its_lock() {
        let fx = Fixture::new().await;
        fx.service
            .set_holder(fx.role.role_id, fx.member.member_id)
            .await
            .unwrap();
        assert!(fx.service.locks.locks.contains_key(&fx.role.role_id));

        fx.service.delete_role(fx.role.role_id).await.unwrap();

        assert!(fx.service.locks.locks.is_empty());
        assert!(matches!(
            fx.service.remove_holder(fx.role.role_id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
