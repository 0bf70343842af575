use super::resolver::ReferenceResolver;
use super::store::MappingStore;
use super::ServiceError;
use crate::models::{Mapping, NewMapping};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct MappingService {
    mappings: Arc<dyn MappingStore>,
    resolver: ReferenceResolver,
}

impl MappingService {
    pub fn new(mappings: Arc<dyn MappingStore>, resolver: ReferenceResolver) -> Self {
        Self { mappings, resolver }
    }

    async fn check(&self, mapping: &NewMapping) -> Result<(), ServiceError> {
        if mapping.matcher.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Mapping matcher must not be empty".to_string(),
            ));
        }
        if let Some(reference) = mapping.reference {
            self.resolver.hydrate(reference).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, mapping), fields(matcher = %mapping.matcher))]
    pub async fn create(&self, mapping: NewMapping) -> Result<Mapping, ServiceError> {
        self.check(&mapping).await?;
        let mapping = self.mappings.insert_mapping(mapping).await?;
        info!(mapping_id = %mapping.mapping_id, "Mapping created");
        Ok(mapping)
    }

    #[instrument(skip(self, mapping), fields(mapping_id = %mapping_id))]
    pub async fn update(
        &self,
        mapping_id: Uuid,
        mapping: NewMapping,
    ) -> Result<Mapping, ServiceError> {
        self.check(&mapping).await?;
        self.mappings
            .update_mapping(mapping_id, mapping)
            .await?
            .ok_or_else(|| ServiceError::not_found("Mapping", mapping_id))
    }

    pub async fn get(&self, mapping_id: Uuid) -> Result<Mapping, ServiceError> {
        self.mappings
            .find_mapping(mapping_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Mapping", mapping_id))
    }

    pub async fn list(&self) -> Result<Vec<Mapping>, ServiceError> {
        self.mappings.list_mappings().await
    }

    #[instrument(skip(self), fields(mapping_id = %mapping_id))]
    pub async fn delete(&self, mapping_id: Uuid) -> Result<(), ServiceError> {
        if !self.mappings.delete_mapping(mapping_id).await? {
            return Err(ServiceError::not_found("Mapping", mapping_id));
        }
        info!("Mapping deleted");
        Ok(())
    }
}
