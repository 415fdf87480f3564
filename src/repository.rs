//! Store capabilities consumed by the transfer services.
//!
//! Services receive these as `Arc<dyn ...>` handles built once per process;
//! `PostgresTransferStore` backs production and `MemoryTransferStore` backs
//! tests.

use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::{
    AcceptStatus, OwnerSummary, PropertySummary, SwapPlan, Transfer, TransferParticipant,
    TransferStatus,
};
use crate::error::Result;

/// Outcome of an attempted ownership swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapCommit {
    /// This caller won the PENDING -> APPROVED transition and the swap committed
    Applied,
    /// Another caller already moved the transfer to a terminal status
    AlreadyResolved(TransferStatus),
    /// The roster was no longer unanimous when re-read inside the transaction
    ConsensusLost,
}

/// Reads and writes on transfers, rosters and live ownership
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get_transfer(&self, transfer_id: Uuid) -> Result<Option<Transfer>>;

    async fn pending_transfer_for_property(&self, property_id: Uuid) -> Result<Option<Transfer>>;

    /// Current owner ids of a property
    async fn live_owners(&self, property_id: Uuid) -> Result<BTreeSet<Uuid>>;

    /// Insert the transfer and its roster rows together.
    ///
    /// Fails with `Conflict` if another PENDING transfer exists for the
    /// property, and with `OwnerSetMismatch` if the OLD roster no longer
    /// matches live ownership at insert time.
    async fn create_transfer(
        &self,
        transfer: &Transfer,
        participants: &[TransferParticipant],
    ) -> Result<Transfer>;

    async fn participants(&self, transfer_id: Uuid) -> Result<Vec<TransferParticipant>>;

    /// Write `status` to every roster row the owner holds on the transfer.
    ///
    /// A REJECTED vote moves the transfer PENDING -> DECLINED in the same
    /// write; either both land or neither does.
    ///
    /// `NotFound` if the transfer is unknown or the owner is not on either
    /// roster, `Conflict` if the transfer is no longer PENDING.
    async fn record_vote(
        &self,
        transfer_id: Uuid,
        owner_id: Uuid,
        status: AcceptStatus,
    ) -> Result<TransferParticipant>;

    /// Conditional PENDING -> APPROVED plus the live-ownership swap, in one
    /// transaction. Any failure rolls back both and returns `Transaction`.
    async fn apply_swap(&self, plan: &SwapPlan) -> Result<SwapCommit>;

    /// Transfers the owner is on either roster of
    async fn transfers_for_owner(&self, owner_id: Uuid) -> Result<Vec<Transfer>>;

    async fn transfers_for_property(&self, property_id: Uuid) -> Result<Vec<Transfer>>;
}

/// Read-only lookups of property and owner display data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    async fn property(&self, property_id: Uuid) -> Result<Option<PropertySummary>>;

    /// Owners that exist among `owner_ids`; unknown ids are omitted
    async fn owners(&self, owner_ids: &[Uuid]) -> Result<Vec<OwnerSummary>>;
}
