//! Receipt windows: lookup by creditor and date, and the per-creditor
//! non-overlap rule.

use super::store::{PartyStore, ReceiptStore};
use super::ServiceError;
use crate::models::{NewReceipt, Receipt};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ReceiptService {
    receipts: Arc<dyn ReceiptStore>,
    parties: Arc<dyn PartyStore>,
}

impl ReceiptService {
    pub fn new(receipts: Arc<dyn ReceiptStore>, parties: Arc<dyn PartyStore>) -> Self {
        Self { receipts, parties }
    }

    /// First receipt of `creditor_id` whose window contains `date`, in store order.
    #[instrument(skip(self), fields(creditor_id = %creditor_id, date = %date))]
    pub async fn find_containing(
        &self,
        creditor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Receipt>, ServiceError> {
        let mut covering = self
            .receipts
            .find_receipts_covering(creditor_id, date)
            .await?;
        if covering.len() > 1 {
            warn!(
                count = covering.len(),
                "Multiple receipts cover the same date, taking the first"
            );
        }
        Ok(if covering.is_empty() {
            None
        } else {
            Some(covering.swap_remove(0))
        })
    }

    /// Reject a window if another receipt of the creditor contains either endpoint.
    ///
    /// `exclude` skips the receipt being updated.
    #[instrument(skip(self), fields(creditor_id = %creditor_id))]
    pub async fn assert_no_overlap(
        &self,
        creditor_id: Uuid,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        for date in [valid_from, valid_to] {
            let clash = self
                .receipts
                .find_receipts_covering(creditor_id, date)
                .await?
                .into_iter()
                .find(|r| Some(r.receipt_id) != exclude);

            if let Some(existing) = clash {
                return Err(ServiceError::OverlappingReceipt {
                    creditor_id,
                    existing: existing.receipt_id,
                    date,
                });
            }
        }
        Ok(())
    }

    async fn check(&self, receipt: &NewReceipt, exclude: Option<Uuid>) -> Result<(), ServiceError> {
        if receipt.valid_from > receipt.valid_to {
            return Err(ServiceError::InvalidWindow {
                valid_from: receipt.valid_from,
                valid_to: receipt.valid_to,
            });
        }
        self.parties
            .find_creditor(receipt.creditor_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Creditor", receipt.creditor_id))?;
        self.assert_no_overlap(
            receipt.creditor_id,
            receipt.valid_from,
            receipt.valid_to,
            exclude,
        )
        .await
    }

    #[instrument(skip(self, receipt), fields(creditor_id = %receipt.creditor_id))]
    pub async fn create(&self, receipt: NewReceipt) -> Result<Receipt, ServiceError> {
        self.check(&receipt, None).await?;
        let receipt = self.receipts.insert_receipt(receipt).await?;
        info!(receipt_id = %receipt.receipt_id, "Receipt created");
        Ok(receipt)
    }

    #[instrument(skip(self, receipt), fields(receipt_id = %receipt_id))]
    pub async fn update(
        &self,
        receipt_id: Uuid,
        receipt: NewReceipt,
    ) -> Result<Receipt, ServiceError> {
        self.get(receipt_id).await?;
        self.check(&receipt, Some(receipt_id)).await?;
        self.receipts
            .update_receipt(receipt_id, receipt)
            .await?
            .ok_or_else(|| ServiceError::not_found("Receipt", receipt_id))
    }

    pub async fn get(&self, receipt_id: Uuid) -> Result<Receipt, ServiceError> {
        self.receipts
            .find_receipt(receipt_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Receipt", receipt_id))
    }

    pub async fn list(&self) -> Result<Vec<Receipt>, ServiceError> {
        self.receipts.list_receipts().await
    }

    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    pub async fn delete(&self, receipt_id: Uuid) -> Result<(), ServiceError> {
        if !self.receipts.delete_receipt(receipt_id).await? {
            return Err(ServiceError::not_found("Receipt", receipt_id));
        }
        info!("Receipt deleted");
        Ok(())
    }
}
