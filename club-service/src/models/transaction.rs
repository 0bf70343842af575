//! Bank transactions and the statement lines they are imported from.

use super::NewReference;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity used to recognise a statement line that was already imported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub booking_day: NaiveDate,
    pub value_day: NaiveDate,
    pub name: String,
    pub description: String,
    pub amount: Decimal,
}

/// One line of an externally sourced bank statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionImport {
    pub booking_day: NaiveDate,
    pub value_day: NaiveDate,
    pub name: String,
    pub description: String,
    pub amount: Decimal,
}

impl TransactionImport {
    pub fn identity_key(&self) -> TransactionKey {
        TransactionKey {
            booking_day: self.booking_day,
            value_day: self.value_day,
            name: self.name.clone(),
            description: self.description.clone(),
            amount: self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub booking_day: NaiveDate,
    pub value_day: NaiveDate,
    pub name: String,
    pub description: String,
    pub amount: Decimal,
    pub reference: Option<NewReference>,
    pub receipt_id: Option<Uuid>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

impl NewTransaction {
    /// Bare transaction for an import line; categorization is filled in later.
    pub fn from_import(import: &TransactionImport) -> Self {
        Self {
            booking_day: import.booking_day,
            value_day: import.value_day,
            name: import.name.clone(),
            description: import.description.clone(),
            amount: import.amount,
            reference: None,
            receipt_id: None,
            purpose_id: None,
            area_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub booking_day: NaiveDate,
    pub value_day: NaiveDate,
    pub name: String,
    pub description: String,
    pub amount: Decimal,
    pub reference: Option<NewReference>,
    pub receipt_id: Option<Uuid>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

impl Transaction {
    pub fn from_new(transaction_id: Uuid, new: NewTransaction) -> Self {
        Self {
            transaction_id,
            booking_day: new.booking_day,
            value_day: new.value_day,
            name: new.name,
            description: new.description,
            amount: new.amount,
            reference: new.reference,
            receipt_id: new.receipt_id,
            purpose_id: new.purpose_id,
            area_id: new.area_id,
        }
    }

    pub fn identity_key(&self) -> TransactionKey {
        TransactionKey {
            booking_day: self.booking_day,
            value_day: self.value_day,
            name: self.name.clone(),
            description: self.description.clone(),
            amount: self.amount,
        }
    }
}
