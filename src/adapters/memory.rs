//! In-memory implementation of the store traits.
//!
//! All state sits behind a single async mutex, so every trait call is atomic
//! with respect to every other. Useful for unit tests of the services and
//! for running the workflow without a database.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    owners_with_role, verify_old_roster, AcceptStatus, ConsensusEvaluator, OwnerSummary,
    PropertySummary, Role, SwapPlan, Transfer, TransferParticipant, TransferStatus,
};
use crate::error::{Result, TransferError};
use crate::repository::{Directory, SwapCommit, TransferRepository};

#[derive(Default)]
struct MemoryState {
    transfers: HashMap<Uuid, Transfer>,
    rosters: HashMap<Uuid, BTreeMap<Uuid, TransferParticipant>>,
    live: HashMap<Uuid, BTreeSet<Uuid>>,
    properties: HashMap<Uuid, PropertySummary>,
    owners: HashMap<Uuid, OwnerSummary>,
    swaps_applied: u64,
    fail_next_swap: bool,
    fail_next_vote: bool,
}

impl MemoryState {
    fn sorted_newest_first(&self, mut transfers: Vec<Transfer>) -> Vec<Transfer> {
        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        transfers
    }
}

/// In-memory transfer store and directory
#[derive(Clone, Default)]
pub struct MemoryTransferStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property and its current owners
    pub async fn add_property(&self, property: PropertySummary, owners: &[Uuid]) {
        let mut state = self.state.lock().await;
        state
            .live
            .insert(property.property_id, owners.iter().copied().collect());
        state.properties.insert(property.property_id, property);
    }

    pub async fn add_owner(&self, owner: OwnerSummary) {
        self.state.lock().await.owners.insert(owner.owner_id, owner);
    }

    /// Insert a transfer and roster as-is, bypassing initiation checks
    pub async fn seed_transfer(&self, transfer: Transfer, participants: Vec<TransferParticipant>) {
        let mut state = self.state.lock().await;
        state.rosters.insert(
            transfer.id,
            participants.into_iter().map(|p| (p.owner_id, p)).collect(),
        );
        state.transfers.insert(transfer.id, transfer);
    }

    /// Current owners of a property
    pub async fn owners_of(&self, property_id: Uuid) -> BTreeSet<Uuid> {
        self.state
            .lock()
            .await
            .live
            .get(&property_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of ownership swaps committed so far
    pub async fn swap_count(&self) -> u64 {
        self.state.lock().await.swaps_applied
    }

    /// Make the next swap fail before any ownership row changes
    pub async fn fail_next_swap(&self) {
        self.state.lock().await.fail_next_swap = true;
    }

    /// Make the next vote fail with `TransientIo` after validation, before
    /// any roster row or status is written
    pub async fn fail_next_vote(&self) {
        self.state.lock().await.fail_next_vote = true;
    }
}

#[async_trait]
impl TransferRepository for MemoryTransferStore {
    async fn get_transfer(&self, transfer_id: Uuid) -> Result<Option<Transfer>> {
        Ok(self.state.lock().await.transfers.get(&transfer_id).cloned())
    }

    async fn pending_transfer_for_property(&self, property_id: Uuid) -> Result<Option<Transfer>> {
        let state = self.state.lock().await;
        Ok(state
            .transfers
            .values()
            .find(|t| t.property_id == property_id && t.status == TransferStatus::Pending)
            .cloned())
    }

    async fn live_owners(&self, property_id: Uuid) -> Result<BTreeSet<Uuid>> {
        Ok(self.owners_of(property_id).await)
    }

    async fn create_transfer(
        &self,
        transfer: &Transfer,
        participants: &[TransferParticipant],
    ) -> Result<Transfer> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state
            .transfers
            .values()
            .find(|t| t.property_id == transfer.property_id && t.status == TransferStatus::Pending)
        {
            return Err(TransferError::Conflict(format!(
                "property {} already has pending transfer {}",
                transfer.property_id, existing.id
            )));
        }

        let live = state
            .live
            .get(&transfer.property_id)
            .cloned()
            .unwrap_or_default();
        verify_old_roster(
            transfer.property_id,
            &owners_with_role(participants, Role::Old),
            &live,
        )?;

        state.rosters.insert(
            transfer.id,
            participants
                .iter()
                .map(|p| (p.owner_id, p.clone()))
                .collect(),
        );
        state.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer.clone())
    }

    async fn participants(&self, transfer_id: Uuid) -> Result<Vec<TransferParticipant>> {
        let state = self.state.lock().await;
        Ok(state
            .rosters
            .get(&transfer_id)
            .map(|roster| roster.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn record_vote(
        &self,
        transfer_id: Uuid,
        owner_id: Uuid,
        status: AcceptStatus,
    ) -> Result<TransferParticipant> {
        let mut state = self.state.lock().await;

        let transfer_status = state
            .transfers
            .get(&transfer_id)
            .map(|t| t.status)
            .ok_or_else(|| TransferError::NotFound(format!("transfer {}", transfer_id)))?;

        let is_participant = state
            .rosters
            .get(&transfer_id)
            .is_some_and(|roster| roster.contains_key(&owner_id));
        if !is_participant {
            return Err(TransferError::NotFound(format!(
                "owner {} is not party to transfer {}",
                owner_id, transfer_id
            )));
        }

        if transfer_status.is_terminal() {
            return Err(TransferError::Conflict(format!(
                "transfer {} already resolved ({})",
                transfer_id, transfer_status
            )));
        }

        if std::mem::take(&mut state.fail_next_vote) {
            return Err(TransferError::TransientIo(format!(
                "vote write for transfer {} interrupted",
                transfer_id
            )));
        }

        // Roster row and status change land under the same lock.
        if status == AcceptStatus::Rejected {
            if let Some(t) = state.transfers.get_mut(&transfer_id) {
                t.status = TransferStatus::Declined;
            }
        }
        let participant = state
            .rosters
            .get_mut(&transfer_id)
            .and_then(|roster| roster.get_mut(&owner_id))
            .ok_or_else(|| TransferError::NotFound(format!("transfer {}", transfer_id)))?;
        participant.accept_status = status;
        Ok(participant.clone())
    }

    async fn apply_swap(&self, plan: &SwapPlan) -> Result<SwapCommit> {
        let mut state = self.state.lock().await;

        let transfer = state
            .transfers
            .get(&plan.transfer_id)
            .cloned()
            .ok_or_else(|| TransferError::NotFound(format!("transfer {}", plan.transfer_id)))?;

        if !transfer.status.can_transition_to(TransferStatus::Approved) {
            return Ok(SwapCommit::AlreadyResolved(transfer.status));
        }
        if transfer.property_id != plan.property_id {
            return Err(TransferError::Transaction(format!(
                "swap plan targets property {} but transfer {} is for {}",
                plan.property_id, transfer.id, transfer.property_id
            )));
        }

        let participants: Vec<TransferParticipant> = state
            .rosters
            .get(&plan.transfer_id)
            .map(|roster| roster.values().cloned().collect())
            .unwrap_or_default();
        if !ConsensusEvaluator::is_unanimous(&participants) {
            return Ok(SwapCommit::ConsensusLost);
        }

        if std::mem::take(&mut state.fail_next_swap) {
            return Err(TransferError::Transaction(format!(
                "insert of new owners failed for transfer {}",
                plan.transfer_id
            )));
        }

        let current = state.live.get(&plan.property_id).cloned().unwrap_or_default();
        state.live.insert(plan.property_id, plan.apply_to(&current));
        if let Some(t) = state.transfers.get_mut(&plan.transfer_id) {
            t.status = TransferStatus::Approved;
        }
        state.swaps_applied += 1;
        debug!(transfer_id = %plan.transfer_id, "In-memory swap committed");
        Ok(SwapCommit::Applied)
    }

    async fn transfers_for_owner(&self, owner_id: Uuid) -> Result<Vec<Transfer>> {
        let state = self.state.lock().await;
        let transfers = state
            .rosters
            .iter()
            .filter(|(_, roster)| roster.contains_key(&owner_id))
            .filter_map(|(id, _)| state.transfers.get(id).cloned())
            .collect();
        Ok(state.sorted_newest_first(transfers))
    }

    async fn transfers_for_property(&self, property_id: Uuid) -> Result<Vec<Transfer>> {
        let state = self.state.lock().await;
        let transfers = state
            .transfers
            .values()
            .filter(|t| t.property_id == property_id)
            .cloned()
            .collect();
        Ok(state.sorted_newest_first(transfers))
    }
}

#[async_trait]
impl Directory for MemoryTransferStore {
    async fn property(&self, property_id: Uuid) -> Result<Option<PropertySummary>> {
        Ok(self.state.lock().await.properties.get(&property_id).cloned())
    }

    async fn owners(&self, owner_ids: &[Uuid]) -> Result<Vec<OwnerSummary>> {
        let state = self.state.lock().await;
        Ok(owner_ids
            .iter()
            .filter_map(|id| state.owners.get(id).cloned())
            .collect())
    }
}
