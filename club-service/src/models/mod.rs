//! Domain models for club-service.
//!
//! Entities come in pairs: `NewX` carries everything but the identifier and is
//! what callers hand to a store, `X` is the persisted record.

mod election;
mod mapping;
mod party;
mod receipt;
mod reference;
mod role;
mod transaction;

pub use election::{Election, RoleState};
pub use mapping::{Mapping, NewMapping};
pub use party::{Creditor, Donor, Member};
pub use receipt::{NewReceipt, Receipt};
pub use reference::{NewReference, Reference, ReferenceKind};
pub use role::{NewRole, Role};
pub use transaction::{NewTransaction, Transaction, TransactionImport, TransactionKey};
