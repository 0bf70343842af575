//! Election terms: who held a role, and when.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One term of a member holding a role. `valid_to` is `None` while the term is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub election_id: Uuid,
    pub role_id: Uuid,
    pub member_id: Uuid,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
}

impl Election {
    pub fn open(role_id: Uuid, member_id: Uuid, valid_from: NaiveDate) -> Self {
        Self {
            election_id: Uuid::new_v4(),
            role_id,
            member_id,
            valid_from,
            valid_to: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Vacant,
    Held(Uuid),
}

impl RoleState {
    pub fn from_open_term(open: Option<&Election>) -> Self {
        match open {
            Some(term) => Self::Held(term.member_id),
            None => Self::Vacant,
        }
    }
}
