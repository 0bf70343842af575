//! Turns stored references into loaded parties.

use super::store::PartyStore;
use super::ServiceError;
use crate::models::{Mapping, NewReference, Reference, TransactionImport};
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone)]
pub struct ReferenceResolver {
    parties: Arc<dyn PartyStore>,
}

impl ReferenceResolver {
    pub fn new(parties: Arc<dyn PartyStore>) -> Self {
        Self { parties }
    }

    /// Load the party a reference points at. A dangling reference is `NotFound`.
    #[instrument(skip(self), fields(kind = reference.kind().as_str(), target = %reference.target()))]
    pub async fn hydrate(&self, reference: NewReference) -> Result<Reference, ServiceError> {
        match reference {
            NewReference::Creditor { creditor } => self
                .parties
                .find_creditor(creditor)
                .await?
                .map(Reference::Creditor)
                .ok_or_else(|| ServiceError::not_found("Creditor", creditor)),
            NewReference::Donor { donor } => self
                .parties
                .find_donor(donor)
                .await?
                .map(Reference::Donor)
                .ok_or_else(|| ServiceError::not_found("Donor", donor)),
            NewReference::Member { member } => self
                .parties
                .find_member(member)
                .await?
                .map(Reference::Member)
                .ok_or_else(|| ServiceError::not_found("Member", member)),
        }
    }

    /// Reference for an import line given the mapping it matched, if any.
    ///
    /// The import line itself carries no party, so an unmapped line, or a
    /// mapping without reference, resolves to `None`.
    pub async fn resolve(
        &self,
        _import: &TransactionImport,
        mapping: Option<&Mapping>,
    ) -> Result<Option<Reference>, ServiceError> {
        match mapping.and_then(|m| m.reference) {
            Some(reference) => self.hydrate(reference).await.map(Some),
            None => Ok(None),
        }
    }
}
