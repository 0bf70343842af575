//! Election ledger: per-role history of holder terms.
//!
//! A role is either vacant (no open term) or held by exactly one member (one
//! open term). Electing closes the open term and opens a new one in a single
//! store write; finishing closes the open term and is a no-op when the role is
//! already vacant.

use super::metrics;
use super::store::{ElectionStore, TermChange};
use super::ServiceError;
use crate::models::{Election, RoleState};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct ElectionLedger {
    elections: Arc<dyn ElectionStore>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl ElectionLedger {
    pub fn new(elections: Arc<dyn ElectionStore>) -> Self {
        Self { elections }
    }

    pub async fn elect(&self, role_id: Uuid, member_id: Uuid) -> Result<TermChange, ServiceError> {
        self.elect_on(role_id, member_id, today()).await
    }

    #[instrument(skip(self), fields(role_id = %role_id, member_id = %member_id, on = %on))]
    pub async fn elect_on(
        &self,
        role_id: Uuid,
        member_id: Uuid,
        on: NaiveDate,
    ) -> Result<TermChange, ServiceError> {
        let change = self.elections.open_term(role_id, member_id, on).await?;
        metrics::record_election("elect");
        info!(
            election_id = %change.opened.election_id,
            previous_member_id = ?change.closed.as_ref().map(|t| t.member_id),
            "Election term opened"
        );
        Ok(change)
    }

    pub async fn finish(&self, role_id: Uuid) -> Result<Option<Election>, ServiceError> {
        self.finish_on(role_id, today()).await
    }

    #[instrument(skip(self), fields(role_id = %role_id, on = %on))]
    pub async fn finish_on(
        &self,
        role_id: Uuid,
        on: NaiveDate,
    ) -> Result<Option<Election>, ServiceError> {
        let closed = self.elections.close_term(role_id, on).await?;
        match &closed {
            Some(term) => {
                metrics::record_election("finish");
                info!(member_id = %term.member_id, "Election term closed");
            }
            None => info!("Role already vacant"),
        }
        Ok(closed)
    }

    pub async fn state(&self, role_id: Uuid) -> Result<RoleState, ServiceError> {
        let open = self.elections.find_open_term(role_id).await?;
        Ok(RoleState::from_open_term(open.as_ref()))
    }

    pub async fn history(&self, role_id: Uuid) -> Result<Vec<Election>, ServiceError> {
        self.elections.list_terms(role_id).await
    }
}
