use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transfer state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Waiting for every participant to vote
    Pending,
    /// Unanimous approval, ownership swapped
    Approved,
    /// A participant rejected
    Declined,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Declined => "DECLINED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: TransferStatus) -> bool {
        use TransferStatus::*;

        matches!((self, target), (Pending, Approved) | (Pending, Declined))
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(TransferStatus::Pending),
            "APPROVED" => Ok(TransferStatus::Approved),
            "DECLINED" => Ok(TransferStatus::Declined),
            _ => Err(format!("Unknown transfer status: {}", s)),
        }
    }
}

/// A proposed change of a property's ownership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: Uuid,
    pub property_id: Uuid,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// A fresh PENDING transfer for a property
    pub fn pending(property_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            status: TransferStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// A participant's vote as stored on the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcceptStatus {
    Pending,
    Approved,
    Rejected,
}

impl AcceptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptStatus::Pending => "PENDING",
            AcceptStatus::Approved => "APPROVED",
            AcceptStatus::Rejected => "REJECTED",
        }
    }

    /// Combine two stored statuses for the same owner, keeping the more
    /// conservative one (REJECTED > PENDING > APPROVED).
    pub fn merge(self, other: AcceptStatus) -> AcceptStatus {
        use AcceptStatus::*;

        match (self, other) {
            (Rejected, _) | (_, Rejected) => Rejected,
            (Pending, _) | (_, Pending) => Pending,
            (Approved, Approved) => Approved,
        }
    }
}

impl fmt::Display for AcceptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AcceptStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(AcceptStatus::Pending),
            "APPROVED" => Ok(AcceptStatus::Approved),
            "REJECTED" => Ok(AcceptStatus::Rejected),
            _ => Err(format!("Unknown accept status: {}", s)),
        }
    }
}

/// A vote cast by an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Roster status written for this decision
    pub fn accept_status(&self) -> AcceptStatus {
        match self {
            Decision::Approve => AcceptStatus::Approved,
            Decision::Reject => AcceptStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "APPROVE"),
            Decision::Reject => write!(f, "REJECT"),
        }
    }
}

/// Result of recording one vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub transfer_id: Uuid,
    /// Transfer status after this vote was processed
    pub status: TransferStatus,
    /// True once every roster entry is APPROVED
    pub all_approved: bool,
    /// True only for the single call whose swap committed the new ownership
    pub swap_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use TransferStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Declined));

        assert!(!Approved.can_transition_to(Declined));
        assert!(!Declined.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            TransferStatus::try_from("declined").unwrap(),
            TransferStatus::Declined
        );
        assert_eq!(
            AcceptStatus::try_from("REJECTED").unwrap(),
            AcceptStatus::Rejected
        );
        assert!(TransferStatus::try_from("CANCELLED").is_err());
    }

    #[test]
    fn test_merge_prefers_conservative_status() {
        use AcceptStatus::*;

        assert_eq!(Approved.merge(Approved), Approved);
        assert_eq!(Approved.merge(Pending), Pending);
        assert_eq!(Pending.merge(Rejected), Rejected);
        assert_eq!(Rejected.merge(Approved), Rejected);
    }

    #[test]
    fn test_transfer_serializes_camel_case() {
        let transfer = Transfer::pending(Uuid::nil());
        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("propertyId").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
