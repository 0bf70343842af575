//! Bank statement import.
//!
//! A batch is processed in input order:
//!
//! 1. Lines whose identity key matches a transaction persisted before the
//!    batch started are skipped. Lines are not deduplicated against each
//!    other, so two identical lines in one batch are both imported.
//! 2. The first mapping whose matcher occurs in the description supplies the
//!    reference, purpose and area.
//! 3. For a creditor reference, the creditor's receipt covering the value day
//!    is attached.
//!
//! Items are persisted one by one. A failure (such as a mapping pointing at a
//! deleted party) stops the batch and leaves earlier items in place.

use super::matcher::MappingMatcher;
use super::metrics;
use super::receipts::ReceiptService;
use super::resolver::ReferenceResolver;
use super::store::{MappingStore, TransactionStore};
use super::ServiceError;
use crate::models::{NewTransaction, Transaction, TransactionImport, TransactionKey};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ImportReconciler {
    transactions: Arc<dyn TransactionStore>,
    mappings: Arc<dyn MappingStore>,
    resolver: ReferenceResolver,
    receipts: ReceiptService,
}

impl ImportReconciler {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        mappings: Arc<dyn MappingStore>,
        resolver: ReferenceResolver,
        receipts: ReceiptService,
    ) -> Self {
        Self {
            transactions,
            mappings,
            resolver,
            receipts,
        }
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn import(&self, items: Vec<TransactionImport>) -> Result<ImportSummary, ServiceError> {
        let known: HashSet<TransactionKey> = self
            .transactions
            .list_transactions()
            .await?
            .iter()
            .map(Transaction::identity_key)
            .collect();
        let matcher = MappingMatcher::new(self.mappings.list_mappings().await?);

        debug!(
            known = known.len(),
            mappings = matcher.len(),
            "Loaded import context"
        );

        let mut summary = ImportSummary::default();
        for item in &items {
            if known.contains(&item.identity_key()) {
                metrics::record_transaction_import("skipped");
                summary.skipped += 1;
                continue;
            }

            let transaction = self.reconcile(item, &matcher).await?;
            let transaction = self.transactions.insert_transaction(transaction).await?;
            debug!(
                transaction_id = %transaction.transaction_id,
                "Imported statement line"
            );
            metrics::record_transaction_import("imported");
            summary.imported += 1;
        }

        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "Import batch completed"
        );
        Ok(summary)
    }

    async fn reconcile(
        &self,
        item: &TransactionImport,
        matcher: &MappingMatcher,
    ) -> Result<NewTransaction, ServiceError> {
        let mut transaction = NewTransaction::from_import(item);

        let Some(mapping) = matcher.find(&item.description) else {
            metrics::record_mapping_match("unmatched");
            return Ok(transaction);
        };
        metrics::record_mapping_match("matched");

        if let Some(reference) = self.resolver.resolve(item, Some(mapping)).await? {
            if let Some(creditor_id) = reference.creditor_id() {
                if let Some(receipt) = self
                    .receipts
                    .find_containing(creditor_id, item.value_day)
                    .await?
                {
                    metrics::record_receipt_attachment();
                    transaction.receipt_id = Some(receipt.receipt_id);
                }
            }
            transaction.reference = Some(reference.to_new());
        }
        transaction.purpose_id = mapping.purpose_id;
        transaction.area_id = mapping.area_id;

        Ok(transaction)
    }
}
