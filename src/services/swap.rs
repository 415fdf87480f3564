use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::SwapPlan;
use crate::error::{Result, TransferError};
use crate::repository::{SwapCommit, TransferRepository};

/// Replaces a property's live ownership once a transfer reaches consensus.
///
/// The status change and the ownership rows move together in one store
/// transaction, guarded by a conditional PENDING -> APPROVED write. Of any
/// number of concurrent callers only the one that wins that write applies the
/// swap; the rest observe `AlreadyResolved`.
#[derive(Clone)]
pub struct OwnershipSwapExecutor {
    repo: Arc<dyn TransferRepository>,
}

impl OwnershipSwapExecutor {
    pub fn new(repo: Arc<dyn TransferRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, transfer_id: Uuid) -> Result<SwapCommit> {
        let transfer = self
            .repo
            .get_transfer(transfer_id)
            .await?
            .ok_or_else(|| TransferError::NotFound(format!("transfer {}", transfer_id)))?;

        if transfer.status.is_terminal() {
            debug!("Transfer already {}, skipping swap", transfer.status);
            return Ok(SwapCommit::AlreadyResolved(transfer.status));
        }

        let participants = self.repo.participants(transfer_id).await?;
        let plan = SwapPlan::from_participants(transfer.id, transfer.property_id, &participants);

        match self.repo.apply_swap(&plan).await {
            Ok(SwapCommit::Applied) => {
                info!(
                    "Ownership of {} moved: {} outgoing, {} incoming",
                    plan.property_id,
                    plan.outgoing.len(),
                    plan.incoming.len()
                );
                Ok(SwapCommit::Applied)
            }
            Ok(SwapCommit::AlreadyResolved(status)) => {
                debug!("Lost swap race, transfer already {}", status);
                Ok(SwapCommit::AlreadyResolved(status))
            }
            Ok(SwapCommit::ConsensusLost) => {
                warn!("Roster no longer unanimous at commit time, swap skipped");
                Ok(SwapCommit::ConsensusLost)
            }
            Err(e) => {
                error!("Ownership swap rolled back: {}", e);
                Err(e)
            }
        }
    }
}
