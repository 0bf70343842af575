//! Storage seams. `Database` implements them on PostgreSQL, `MemoryStore`
//! in process.

use super::ServiceError;
use crate::models::{
    Creditor, Donor, Election, Mapping, Member, NewMapping, NewReceipt, NewRole, NewTransaction,
    Receipt, Role, Transaction,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

#[async_trait]
pub trait PartyStore: Send + Sync {
    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, ServiceError>;

    async fn find_donor(&self, donor_id: Uuid) -> Result<Option<Donor>, ServiceError>;

    async fn find_creditor(&self, creditor_id: Uuid) -> Result<Option<Creditor>, ServiceError>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, ServiceError>;

    async fn update_receipt(
        &self,
        receipt_id: Uuid,
        receipt: NewReceipt,
    ) -> Result<Option<Receipt>, ServiceError>;

    async fn find_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, ServiceError>;

    async fn list_receipts(&self) -> Result<Vec<Receipt>, ServiceError>;

    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<bool, ServiceError>;

    /// Receipts of `creditor_id` whose window contains `date`, in a stable order.
    async fn find_receipts_covering(
        &self,
        creditor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Receipt>, ServiceError>;
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn insert_mapping(&self, mapping: NewMapping) -> Result<Mapping, ServiceError>;

    async fn update_mapping(
        &self,
        mapping_id: Uuid,
        mapping: NewMapping,
    ) -> Result<Option<Mapping>, ServiceError>;

    async fn find_mapping(&self, mapping_id: Uuid) -> Result<Option<Mapping>, ServiceError>;

    /// All mappings in insertion order.
    async fn list_mappings(&self) -> Result<Vec<Mapping>, ServiceError>;

    async fn delete_mapping(&self, mapping_id: Uuid) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, ServiceError>;

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, ServiceError>;

    /// All transactions in insertion order.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, ServiceError>;

    async fn delete_transaction(&self, transaction_id: Uuid) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn insert_role(&self, role: NewRole) -> Result<Role, ServiceError>;

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError>;

    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError>;

    /// Deletes the role together with its election history.
    async fn delete_role(&self, role_id: Uuid) -> Result<bool, ServiceError>;

    async fn add_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError>;

    async fn remove_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError>;
}

/// Result of opening a term: the term that was closed to make room, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermChange {
    pub closed: Option<Election>,
    pub opened: Election,
}

/// Election history per role.
///
/// Each method is a single atomic write that also keeps `Role::holder_member_id`
/// in step with the open term.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    /// Close the role's open term on `on` (if any) and open one for `member_id`.
    async fn open_term(
        &self,
        role_id: Uuid,
        member_id: Uuid,
        on: NaiveDate,
    ) -> Result<TermChange, ServiceError>;

    /// Close the role's open term on `on`. Writes nothing when there is none.
    async fn close_term(&self, role_id: Uuid, on: NaiveDate)
        -> Result<Option<Election>, ServiceError>;

    async fn find_open_term(&self, role_id: Uuid) -> Result<Option<Election>, ServiceError>;

    /// All terms of the role ordered by start date.
    async fn list_terms(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError>;
}

/// Everything the service persists, plus a liveness probe.
#[async_trait]
pub trait ClubStore:
    PartyStore + ReceiptStore + MappingStore + TransactionStore + RoleStore + ElectionStore
{
    async fn health_check(&self) -> Result<(), ServiceError>;
}
