use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AcceptStatus, TransferStatus};

/// Display data for a property, read from the external property table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub property_id: Uuid,
    pub name: String,
    pub address: Option<String>,
}

/// Display data for an owner, joined through the owner and user tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub owner_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl OwnerSummary {
    /// Placeholder for an owner the directory does not know about
    pub fn unknown(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            first_name: None,
            last_name: None,
            email: None,
        }
    }
}

/// One roster member in a transfer view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterMember {
    #[serde(flatten)]
    pub owner: OwnerSummary,
    pub vote: AcceptStatus,
}

/// Read-side projection of a transfer for a single owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub transfer_id: Uuid,
    pub property_id: Uuid,
    pub property_name: Option<String>,
    pub property_address: Option<String>,
    pub transfer_status: TransferStatus,
    /// Absent when the view is not built for a participant
    pub this_owner_vote: Option<AcceptStatus>,
    pub old_owners: Vec<RosterMember>,
    pub new_owners: Vec<RosterMember>,
    pub created_at: DateTime<Utc>,
}
