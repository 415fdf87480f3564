use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{ConsensusEvaluator, Decision, TransferStatus, VoteOutcome};
use crate::error::{Result, TransferError};
use crate::repository::{SwapCommit, TransferRepository};
use crate::services::OwnershipSwapExecutor;

/// Records owner votes and drives a transfer to its terminal state
#[derive(Clone)]
pub struct ConsentTracker {
    repo: Arc<dyn TransferRepository>,
    swap: OwnershipSwapExecutor,
}

impl ConsentTracker {
    pub fn new(repo: Arc<dyn TransferRepository>, swap: OwnershipSwapExecutor) -> Self {
        Self { repo, swap }
    }

    /// Record `decision` for every roster row the owner holds on the transfer.
    ///
    /// A REJECT is stored together with the PENDING -> DECLINED transition.
    /// An APPROVE that completes consensus runs the ownership swap. Votes on
    /// a transfer that is no longer PENDING fail with `Conflict`.
    #[instrument(skip(self))]
    pub async fn record_vote(
        &self,
        transfer_id: Uuid,
        owner_id: Uuid,
        decision: Decision,
    ) -> Result<VoteOutcome> {
        let participant = self
            .repo
            .record_vote(transfer_id, owner_id, decision.accept_status())
            .await?;
        debug!(
            continuing = participant.roles.is_continuing(),
            "Recorded {} vote",
            decision
        );

        match decision {
            Decision::Reject => {
                info!("Transfer {} declined by owner {}", transfer_id, owner_id);
                Ok(VoteOutcome {
                    transfer_id,
                    status: TransferStatus::Declined,
                    all_approved: false,
                    swap_applied: false,
                })
            }
            Decision::Approve => self.evaluate(transfer_id).await,
        }
    }

    async fn evaluate(&self, transfer_id: Uuid) -> Result<VoteOutcome> {
        let participants = self.repo.participants(transfer_id).await?;
        if !ConsensusEvaluator::is_unanimous(&participants) {
            debug!(
                "Transfer {} waiting on {} participant(s)",
                transfer_id,
                ConsensusEvaluator::outstanding(&participants)
            );
            return Ok(VoteOutcome {
                transfer_id,
                status: TransferStatus::Pending,
                all_approved: false,
                swap_applied: false,
            });
        }

        let commit = self.swap.execute(transfer_id).await?;
        let status = match commit {
            SwapCommit::Applied => TransferStatus::Approved,
            SwapCommit::AlreadyResolved(status) => status,
            SwapCommit::ConsensusLost => self.current_status(transfer_id).await?,
        };

        Ok(VoteOutcome {
            transfer_id,
            status,
            all_approved: status == TransferStatus::Approved,
            swap_applied: commit == SwapCommit::Applied,
        })
    }

    async fn current_status(&self, transfer_id: Uuid) -> Result<TransferStatus> {
        self.repo
            .get_transfer(transfer_id)
            .await?
            .map(|t| t.status)
            .ok_or_else(|| TransferError::NotFound(format!("transfer {}", transfer_id)))
    }
}
