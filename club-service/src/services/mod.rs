//! Services for club-service.

pub mod database;
pub mod elections;
pub mod error;
pub mod identity;
pub mod importer;
pub mod mappings;
pub mod matcher;
pub mod memory;
pub mod metrics;
pub mod receipts;
pub mod resolver;
pub mod roles;
pub mod store;
pub mod transactions;

pub use database::Database;
pub use elections::ElectionLedger;
pub use error::ServiceError;
pub use identity::{IdentityError, IdentityProvider, KeycloakClient, MockIdentityProvider};
pub use importer::{ImportReconciler, ImportSummary};
pub use mappings::MappingService;
pub use matcher::MappingMatcher;
pub use memory::MemoryStore;
pub use receipts::ReceiptService;
pub use resolver::ReferenceResolver;
pub use roles::{RoleLocks, RoleService};
pub use store::ClubStore;
pub use transactions::TransactionService;
