//! Club Service - bank statement import reconciliation and role elections.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
