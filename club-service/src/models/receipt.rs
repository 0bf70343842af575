//! Receipts: a creditor's standing proof of payment for a date window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReceipt {
    pub name: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub creditor_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub name: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub creditor_id: Uuid,
}

impl Receipt {
    pub fn from_new(receipt_id: Uuid, new: NewReceipt) -> Self {
        Self {
            receipt_id,
            name: new.name,
            valid_from: new.valid_from,
            valid_to: new.valid_to,
            creditor_id: new.creditor_id,
        }
    }

    /// Whether `date` lies in `[valid_from, valid_to]`, both ends inclusive.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }
}
