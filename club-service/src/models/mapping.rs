//! Categorization rules applied to imported transactions.

use super::NewReference;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapping {
    pub matcher: String,
    pub reference: Option<NewReference>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

/// Any import whose description contains `matcher` (ignoring case) is tagged
/// with this mapping's reference, purpose and area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub mapping_id: Uuid,
    pub matcher: String,
    pub reference: Option<NewReference>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

impl Mapping {
    pub fn from_new(mapping_id: Uuid, new: NewMapping) -> Self {
        Self {
            mapping_id,
            matcher: new.matcher,
            reference: new.reference,
            purpose_id: new.purpose_id,
            area_id: new.area_id,
        }
    }
}
