//! Ownership transfer workflow
//!
//! - `TransferInitiator` opens a transfer after validating current ownership
//! - `ConsentTracker` records votes and resolves the transfer
//! - `OwnershipSwapExecutor` applies the ownership change on consensus
//! - `TransferQueryService` projects transfers for display
//!
//! `TransferService` wires all four to one injected store.

pub mod consent;
pub mod initiator;
pub mod query;
pub mod swap;

pub use consent::ConsentTracker;
pub use initiator::TransferInitiator;
pub use query::TransferQueryService;
pub use swap::OwnershipSwapExecutor;

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Decision, Transfer, TransferView, VoteOutcome};
use crate::error::Result;
use crate::repository::{Directory, TransferRepository};

/// Entry point for the four client actions: initiate, approve, reject, list
#[derive(Clone)]
pub struct TransferService {
    initiator: TransferInitiator,
    consent: ConsentTracker,
    query: TransferQueryService,
}

impl TransferService {
    pub fn new(repo: Arc<dyn TransferRepository>, directory: Arc<dyn Directory>) -> Self {
        let swap = OwnershipSwapExecutor::new(repo.clone());
        Self {
            initiator: TransferInitiator::new(repo.clone(), directory.clone()),
            consent: ConsentTracker::new(repo.clone(), swap),
            query: TransferQueryService::new(repo, directory),
        }
    }

    /// Build from a single value implementing both store traits
    pub fn from_store<S>(store: S) -> Self
    where
        S: TransferRepository + Directory + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    pub async fn initiate(
        &self,
        property_id: Uuid,
        all_old_owner_ids: &[Uuid],
        new_owner_ids: &[Uuid],
    ) -> Result<Transfer> {
        self.initiator
            .initiate(property_id, all_old_owner_ids, new_owner_ids)
            .await
    }

    pub async fn record_vote(
        &self,
        transfer_id: Uuid,
        owner_id: Uuid,
        decision: Decision,
    ) -> Result<VoteOutcome> {
        self.consent.record_vote(transfer_id, owner_id, decision).await
    }

    pub async fn approve(&self, transfer_id: Uuid, owner_id: Uuid) -> Result<VoteOutcome> {
        self.record_vote(transfer_id, owner_id, Decision::Approve).await
    }

    pub async fn reject(&self, transfer_id: Uuid, owner_id: Uuid) -> Result<VoteOutcome> {
        self.record_vote(transfer_id, owner_id, Decision::Reject).await
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<TransferView>> {
        self.query.list_for_owner(owner_id).await
    }

    pub async fn list_for_property(&self, property_id: Uuid) -> Result<Vec<TransferView>> {
        self.query.list_for_property(property_id).await
    }
}
