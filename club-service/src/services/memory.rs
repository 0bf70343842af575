//! In-process store. One mutex guards all state, so every trait method is
//! atomic, including the two-record election writes.

use super::store::{
    ClubStore, ElectionStore, MappingStore, PartyStore, ReceiptStore, RoleStore, TermChange,
    TransactionStore,
};
use super::ServiceError;
use crate::models::{
    Creditor, Donor, Election, Mapping, Member, NewMapping, NewReceipt, NewRole, NewTransaction,
    Receipt, Role, Transaction,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    members: Vec<Member>,
    donors: Vec<Donor>,
    creditors: Vec<Creditor>,
    receipts: Vec<Receipt>,
    mappings: Vec<Mapping>,
    transactions: Vec<Transaction>,
    roles: Vec<Role>,
    elections: Vec<Election>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("Memory store lock poisoned")))
    }

    pub fn insert_member(&self, first_name: &str, last_name: &str, subject: &str) -> Member {
        let member = Member {
            member_id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            subject: subject.to_string(),
        };
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .members
            .push(member.clone());
        member
    }

    pub fn insert_donor(&self, name: &str) -> Donor {
        let donor = Donor {
            donor_id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .donors
            .push(donor.clone());
        donor
    }

    pub fn insert_creditor(&self, name: &str) -> Creditor {
        let creditor = Creditor {
            creditor_id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .creditors
            .push(creditor.clone());
        creditor
    }

    pub fn remove_member(&self, member_id: Uuid) {
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .members
            .retain(|m| m.member_id != member_id);
    }
}

#[async_trait]
impl PartyStore for MemoryStore {
    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, ServiceError> {
        Ok(self
            .state()?
            .members
            .iter()
            .find(|m| m.member_id == member_id)
            .cloned())
    }

    async fn find_donor(&self, donor_id: Uuid) -> Result<Option<Donor>, ServiceError> {
        Ok(self
            .state()?
            .donors
            .iter()
            .find(|d| d.donor_id == donor_id)
            .cloned())
    }

    async fn find_creditor(&self, creditor_id: Uuid) -> Result<Option<Creditor>, ServiceError> {
        Ok(self
            .state()?
            .creditors
            .iter()
            .find(|c| c.creditor_id == creditor_id)
            .cloned())
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn insert_receipt(&self, receipt: NewReceipt) -> Result<Receipt, ServiceError> {
        let receipt = Receipt::from_new(Uuid::new_v4(), receipt);
        self.state()?.receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn update_receipt(
        &self,
        receipt_id: Uuid,
        receipt: NewReceipt,
    ) -> Result<Option<Receipt>, ServiceError> {
        let mut state = self.state()?;
        Ok(state
            .receipts
            .iter_mut()
            .find(|r| r.receipt_id == receipt_id)
            .map(|existing| {
                *existing = Receipt::from_new(receipt_id, receipt);
                existing.clone()
            }))
    }

    async fn find_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, ServiceError> {
        Ok(self
            .state()?
            .receipts
            .iter()
            .find(|r| r.receipt_id == receipt_id)
            .cloned())
    }

    async fn list_receipts(&self) -> Result<Vec<Receipt>, ServiceError> {
        let mut receipts = self.state()?.receipts.clone();
        receipts.sort_by_key(|r| r.valid_from);
        Ok(receipts)
    }

    async fn delete_receipt(&self, receipt_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state()?;
        let before = state.receipts.len();
        state.receipts.retain(|r| r.receipt_id != receipt_id);
        let deleted = state.receipts.len() != before;
        if deleted {
            for transaction in state
                .transactions
                .iter_mut()
                .filter(|t| t.receipt_id == Some(receipt_id))
            {
                transaction.receipt_id = None;
            }
        }
        Ok(deleted)
    }

    async fn find_receipts_covering(
        &self,
        creditor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Receipt>, ServiceError> {
        Ok(self
            .state()?
            .receipts
            .iter()
            .filter(|r| r.creditor_id == creditor_id && r.covers(date))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn insert_mapping(&self, mapping: NewMapping) -> Result<Mapping, ServiceError> {
        let mapping = Mapping::from_new(Uuid::new_v4(), mapping);
        self.state()?.mappings.push(mapping.clone());
        Ok(mapping)
    }

    async fn update_mapping(
        &self,
        mapping_id: Uuid,
        mapping: NewMapping,
    ) -> Result<Option<Mapping>, ServiceError> {
        let mut state = self.state()?;
        Ok(state
            .mappings
            .iter_mut()
            .find(|m| m.mapping_id == mapping_id)
            .map(|existing| {
                *existing = Mapping::from_new(mapping_id, mapping);
                existing.clone()
            }))
    }

    async fn find_mapping(&self, mapping_id: Uuid) -> Result<Option<Mapping>, ServiceError> {
        Ok(self
            .state()?
            .mappings
            .iter()
            .find(|m| m.mapping_id == mapping_id)
            .cloned())
    }

    async fn list_mappings(&self) -> Result<Vec<Mapping>, ServiceError> {
        Ok(self.state()?.mappings.clone())
    }

    async fn delete_mapping(&self, mapping_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state()?;
        let before = state.mappings.len();
        state.mappings.retain(|m| m.mapping_id != mapping_id);
        Ok(state.mappings.len() != before)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, ServiceError> {
        let transaction = Transaction::from_new(Uuid::new_v4(), transaction);
        self.state()?.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, ServiceError> {
        Ok(self
            .state()?
            .transactions
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.state()?.transactions.clone())
    }

    async fn delete_transaction(&self, transaction_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state()?;
        let before = state.transactions.len();
        state.transactions.retain(|t| t.transaction_id != transaction_id);
        Ok(state.transactions.len() != before)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn insert_role(&self, role: NewRole) -> Result<Role, ServiceError> {
        let role = Role::from_new(Uuid::new_v4(), role);
        self.state()?.roles.push(role.clone());
        Ok(role)
    }

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        Ok(self
            .state()?
            .roles
            .iter()
            .find(|r| r.role_id == role_id)
            .cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        let mut roles = self.state()?.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state()?;
        let before = state.roles.len();
        state.roles.retain(|r| r.role_id != role_id);
        state.elections.retain(|e| e.role_id != role_id);
        Ok(state.roles.len() != before)
    }

    async fn add_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError> {
        let mut state = self.state()?;
        Ok(state
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .map(|role| {
                role.permissions.insert(permission.to_string());
                role.clone()
            }))
    }

    async fn remove_permission(
        &self,
        role_id: Uuid,
        permission: &str,
    ) -> Result<Option<Role>, ServiceError> {
        let mut state = self.state()?;
        Ok(state
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .map(|role| {
                role.permissions.remove(permission);
                role.clone()
            }))
    }
}

#[async_trait]
impl ElectionStore for MemoryStore {
    async fn open_term(
        &self,
        role_id: Uuid,
        member_id: Uuid,
        on: NaiveDate,
    ) -> Result<TermChange, ServiceError> {
        let mut state = self.state()?;
        let state = &mut *state;

        let role = state
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .ok_or_else(|| ServiceError::not_found("Role", role_id))?;

        let closed = state
            .elections
            .iter_mut()
            .find(|e| e.role_id == role_id && e.is_open())
            .map(|term| {
                term.valid_to = Some(on);
                term.clone()
            });

        let opened = Election::open(role_id, member_id, on);
        state.elections.push(opened.clone());
        role.holder_member_id = Some(member_id);

        Ok(TermChange { closed, opened })
    }

    async fn close_term(
        &self,
        role_id: Uuid,
        on: NaiveDate,
    ) -> Result<Option<Election>, ServiceError> {
        let mut state = self.state()?;
        let state = &mut *state;

        let Some(term) = state
            .elections
            .iter_mut()
            .find(|e| e.role_id == role_id && e.is_open())
        else {
            return Ok(None);
        };
        term.valid_to = Some(on);
        let closed = term.clone();

        if let Some(role) = state.roles.iter_mut().find(|r| r.role_id == role_id) {
            role.holder_member_id = None;
        }

        Ok(Some(closed))
    }

    async fn find_open_term(&self, role_id: Uuid) -> Result<Option<Election>, ServiceError> {
        Ok(self
            .state()?
            .elections
            .iter()
            .find(|e| e.role_id == role_id && e.is_open())
            .cloned())
    }

    async fn list_terms(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError> {
        let mut terms: Vec<Election> = self
            .state()?
            .elections
            .iter()
            .filter(|e| e.role_id == role_id)
            .cloned()
            .collect();
        terms.sort_by_key(|e| e.valid_from);
        Ok(terms)
    }
}

#[async_trait]
impl ClubStore for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.state().map(|_| ())
    }
}
