//! HTTP handlers for club-service.

pub mod health;
pub mod mappings;
pub mod receipts;
pub mod roles;
pub mod transactions;
