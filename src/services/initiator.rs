use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{build_participants, verify_old_roster, Transfer};
use crate::error::{Result, TransferError};
use crate::repository::{Directory, TransferRepository};

/// Opens new transfers after checking current ownership
#[derive(Clone)]
pub struct TransferInitiator {
    repo: Arc<dyn TransferRepository>,
    directory: Arc<dyn Directory>,
}

impl TransferInitiator {
    pub fn new(repo: Arc<dyn TransferRepository>, directory: Arc<dyn Directory>) -> Self {
        Self { repo, directory }
    }

    /// Create a PENDING transfer with an OLD roster of `all_old_owner_ids` and
    /// a NEW roster of `new_owner_ids`.
    ///
    /// The old owner set must equal the property's live ownership exactly.
    /// Ids present in both lists become continuing owners. Duplicate ids are
    /// ignored.
    #[instrument(skip(self, all_old_owner_ids, new_owner_ids))]
    pub async fn initiate(
        &self,
        property_id: Uuid,
        all_old_owner_ids: &[Uuid],
        new_owner_ids: &[Uuid],
    ) -> Result<Transfer> {
        let old_set: BTreeSet<Uuid> = all_old_owner_ids.iter().copied().collect();
        let new_set: BTreeSet<Uuid> = new_owner_ids.iter().copied().collect();

        if new_set.is_empty() {
            return Err(TransferError::Validation(
                "new owner set must not be empty".to_string(),
            ));
        }

        if self.directory.property(property_id).await?.is_none() {
            return Err(TransferError::NotFound(format!("property {}", property_id)));
        }

        if let Some(pending) = self.repo.pending_transfer_for_property(property_id).await? {
            return Err(TransferError::Conflict(format!(
                "property {} already has pending transfer {}",
                property_id, pending.id
            )));
        }

        // Re-checked by the store inside the insert transaction.
        let live = self.repo.live_owners(property_id).await?;
        if let Err(e) = verify_old_roster(property_id, &old_set, &live) {
            warn!("Rejected transfer for {}: {}", property_id, e);
            return Err(e);
        }

        let transfer = Transfer::pending(property_id);
        let participants = build_participants(transfer.id, &old_set, &new_set);
        let created = self.repo.create_transfer(&transfer, &participants).await?;

        info!(
            transfer_id = %created.id,
            "Opened transfer for property {} ({} old, {} new, {} continuing)",
            property_id,
            old_set.len(),
            new_set.len(),
            old_set.intersection(&new_set).count()
        );
        Ok(created)
    }
}
