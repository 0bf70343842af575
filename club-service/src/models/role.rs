//! Organizational roles mirrored into the identity provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

/// Current state of a role. `holder_member_id` caches the member of the open
/// election term; the election history is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub permissions: BTreeSet<String>,
    pub holder_member_id: Option<Uuid>,
}

impl Role {
    pub fn from_new(role_id: Uuid, new: NewRole) -> Self {
        Self {
            role_id,
            name: new.name,
            permissions: new.permissions,
            holder_member_id: None,
        }
    }
}
