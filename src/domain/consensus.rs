//! Consensus evaluation over a transfer's roster.

use super::{AcceptStatus, TransferParticipant};

/// Stateless check for unanimous approval
pub struct ConsensusEvaluator;

impl ConsensusEvaluator {
    /// True iff there is at least one participant and every roster entry
    /// (both roles of a continuing owner included) is APPROVED.
    pub fn is_unanimous(participants: &[TransferParticipant]) -> bool {
        !participants.is_empty()
            && participants
                .iter()
                .flat_map(|p| p.entries())
                .all(|entry| entry.accept_status == AcceptStatus::Approved)
    }

    /// Number of participants still to vote
    pub fn outstanding(participants: &[TransferParticipant]) -> usize {
        participants
            .iter()
            .filter(|p| p.accept_status == AcceptStatus::Pending)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, RoleSet};
    use uuid::Uuid;

    fn participant(roles: RoleSet, status: AcceptStatus) -> TransferParticipant {
        TransferParticipant {
            transfer_id: Uuid::nil(),
            owner_id: Uuid::new_v4(),
            roles,
            accept_status: status,
        }
    }

    #[test]
    fn test_all_approved_is_unanimous() {
        let roster = vec![
            participant(RoleSet::only(Role::Old), AcceptStatus::Approved),
            participant(RoleSet::both(), AcceptStatus::Approved),
            participant(RoleSet::only(Role::New), AcceptStatus::Approved),
        ];
        assert!(ConsensusEvaluator::is_unanimous(&roster));
        assert_eq!(ConsensusEvaluator::outstanding(&roster), 0);
    }

    #[test]
    fn test_pending_or_rejected_blocks_consensus() {
        let pending = vec![
            participant(RoleSet::only(Role::Old), AcceptStatus::Approved),
            participant(RoleSet::only(Role::New), AcceptStatus::Pending),
        ];
        assert!(!ConsensusEvaluator::is_unanimous(&pending));
        assert_eq!(ConsensusEvaluator::outstanding(&pending), 1);

        let rejected = vec![
            participant(RoleSet::only(Role::Old), AcceptStatus::Rejected),
            participant(RoleSet::only(Role::New), AcceptStatus::Approved),
        ];
        assert!(!ConsensusEvaluator::is_unanimous(&rejected));
        assert_eq!(ConsensusEvaluator::outstanding(&rejected), 0);
    }

    #[test]
    fn test_empty_roster_has_no_consensus() {
        assert!(!ConsensusEvaluator::is_unanimous(&[]));
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let roster = vec![participant(RoleSet::both(), AcceptStatus::Approved)];
        for _ in 0..3 {
            assert!(ConsensusEvaluator::is_unanimous(&roster));
        }
    }
}
