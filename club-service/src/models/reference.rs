//! Polymorphic payer/payee reference.

use super::{Creditor, Donor, Member};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Creditor,
    Donor,
    Member,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creditor => "creditor",
            Self::Donor => "donor",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creditor" => Some(Self::Creditor),
            "donor" => Some(Self::Donor),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

/// Reference by identifier only, as stored on mappings and transactions.
///
/// Serialized as `{"type": "creditor", "creditor": "<uuid>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewReference {
    Creditor { creditor: Uuid },
    Donor { donor: Uuid },
    Member { member: Uuid },
}

impl NewReference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Creditor { .. } => ReferenceKind::Creditor,
            Self::Donor { .. } => ReferenceKind::Donor,
            Self::Member { .. } => ReferenceKind::Member,
        }
    }

    /// Identifier of the referenced party.
    pub fn target(&self) -> Uuid {
        match *self {
            Self::Creditor { creditor } => creditor,
            Self::Donor { donor } => donor,
            Self::Member { member } => member,
        }
    }

    pub fn from_parts(kind: ReferenceKind, target: Uuid) -> Self {
        match kind {
            ReferenceKind::Creditor => Self::Creditor { creditor: target },
            ReferenceKind::Donor => Self::Donor { donor: target },
            ReferenceKind::Member => Self::Member { member: target },
        }
    }
}

/// Reference with the party loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reference {
    Creditor(Creditor),
    Donor(Donor),
    Member(Member),
}

impl Reference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::Creditor(_) => ReferenceKind::Creditor,
            Self::Donor(_) => ReferenceKind::Donor,
            Self::Member(_) => ReferenceKind::Member,
        }
    }

    pub fn to_new(&self) -> NewReference {
        match self {
            Self::Creditor(c) => NewReference::Creditor {
                creditor: c.creditor_id,
            },
            Self::Donor(d) => NewReference::Donor { donor: d.donor_id },
            Self::Member(m) => NewReference::Member {
                member: m.member_id,
            },
        }
    }

    /// Creditor id when this references a creditor; receipts only exist for creditors.
    pub fn creditor_id(&self) -> Option<Uuid> {
        match self {
            Self::Creditor(c) => Some(c.creditor_id),
            Self::Donor(_) | Self::Member(_) => None,
        }
    }
}
