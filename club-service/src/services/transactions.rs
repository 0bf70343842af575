use super::receipts::ReceiptService;
use super::resolver::ReferenceResolver;
use super::store::TransactionStore;
use super::ServiceError;
use crate::models::{NewTransaction, Transaction};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Manually booked transactions. Imports go through `ImportReconciler`.
#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionStore>,
    resolver: ReferenceResolver,
    receipts: ReceiptService,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        resolver: ReferenceResolver,
        receipts: ReceiptService,
    ) -> Self {
        Self {
            transactions,
            resolver,
            receipts,
        }
    }

    #[instrument(skip(self, transaction), fields(value_day = %transaction.value_day))]
    pub async fn create(&self, transaction: NewTransaction) -> Result<Transaction, ServiceError> {
        if let Some(reference) = transaction.reference {
            self.resolver.hydrate(reference).await?;
        }
        if let Some(receipt_id) = transaction.receipt_id {
            self.receipts.get(receipt_id).await?;
        }
        let transaction = self.transactions.insert_transaction(transaction).await?;
        info!(transaction_id = %transaction.transaction_id, "Transaction created");
        Ok(transaction)
    }

    pub async fn get(&self, transaction_id: Uuid) -> Result<Transaction, ServiceError> {
        self.transactions
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Transaction", transaction_id))
    }

    pub async fn list(&self) -> Result<Vec<Transaction>, ServiceError> {
        self.transactions.list_transactions().await
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn delete(&self, transaction_id: Uuid) -> Result<(), ServiceError> {
        if !self.transactions.delete_transaction(transaction_id).await? {
            return Err(ServiceError::not_found("Transaction", transaction_id));
        }
        info!("Transaction deleted");
        Ok(())
    }
}
