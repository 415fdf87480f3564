use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use super::AcceptStatus;
use crate::error::{Result, TransferError};

/// Which roster an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Outgoing owner, consents before the swap
    Old,
    /// Incoming owner, consents to receive ownership
    New,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Old => "OLD",
            Role::New => "NEW",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Set of roster roles held by one owner. Never empty for a stored participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleSet {
    pub old: bool,
    pub new: bool,
}

impl RoleSet {
    pub fn only(role: Role) -> Self {
        Self::default().with(role)
    }

    pub fn both() -> Self {
        Self {
            old: true,
            new: true,
        }
    }

    pub fn with(mut self, role: Role) -> Self {
        match role {
            Role::Old => self.old = true,
            Role::New => self.new = true,
        }
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        match role {
            Role::Old => self.old,
            Role::New => self.new,
        }
    }

    /// Present in both rosters
    pub fn is_continuing(&self) -> bool {
        self.old && self.new
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> {
        let old = self.old.then_some(Role::Old);
        let new = self.new.then_some(Role::New);
        old.into_iter().chain(new)
    }
}

/// One owner's participation in a transfer.
///
/// A continuing owner holds both roles under a single `accept_status`, so one
/// vote always covers both roster rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParticipant {
    pub transfer_id: Uuid,
    pub owner_id: Uuid,
    pub roles: RoleSet,
    pub accept_status: AcceptStatus,
}

impl TransferParticipant {
    pub fn pending(transfer_id: Uuid, owner_id: Uuid, roles: RoleSet) -> Self {
        Self {
            transfer_id,
            owner_id,
            roles,
            accept_status: AcceptStatus::Pending,
        }
    }

    /// Flatten into one roster row per held role
    pub fn entries(&self) -> impl Iterator<Item = RosterEntry> + '_ {
        self.roles.iter().map(move |role| RosterEntry {
            transfer_id: self.transfer_id,
            owner_id: self.owner_id,
            role,
            accept_status: self.accept_status,
        })
    }
}

/// A single row of the OLD or NEW roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub transfer_id: Uuid,
    pub owner_id: Uuid,
    pub role: Role,
    pub accept_status: AcceptStatus,
}

/// Build the PENDING participant list for a new transfer, merging owners that
/// appear in both rosters. Output is ordered by owner id.
pub fn build_participants(
    transfer_id: Uuid,
    old_owner_ids: &BTreeSet<Uuid>,
    new_owner_ids: &BTreeSet<Uuid>,
) -> Vec<TransferParticipant> {
    let mut roles: BTreeMap<Uuid, RoleSet> = BTreeMap::new();
    for id in old_owner_ids {
        let entry = roles.entry(*id).or_default();
        *entry = entry.with(Role::Old);
    }
    for id in new_owner_ids {
        let entry = roles.entry(*id).or_default();
        *entry = entry.with(Role::New);
    }

    roles
        .into_iter()
        .map(|(owner_id, roles)| TransferParticipant::pending(transfer_id, owner_id, roles))
        .collect()
}

/// Merge flat roster rows into participants, one per owner
pub fn merge_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Vec<TransferParticipant> {
    let mut merged: BTreeMap<Uuid, TransferParticipant> = BTreeMap::new();
    for entry in entries {
        merged
            .entry(entry.owner_id)
            .and_modify(|p| {
                p.roles = p.roles.with(entry.role);
                p.accept_status = p.accept_status.merge(entry.accept_status);
            })
            .or_insert_with(|| TransferParticipant {
                transfer_id: entry.transfer_id,
                owner_id: entry.owner_id,
                roles: RoleSet::only(entry.role),
                accept_status: entry.accept_status,
            });
    }
    merged.into_values().collect()
}

/// Distinct owner ids holding `role`, in id order
pub fn owners_with_role(participants: &[TransferParticipant], role: Role) -> BTreeSet<Uuid> {
    participants
        .iter()
        .filter(|p| p.roles.contains(role))
        .map(|p| p.owner_id)
        .collect()
}

/// Fail with `OwnerSetMismatch` unless `old_owner_ids` is exactly the live
/// owner set of the property.
pub fn verify_old_roster(
    property_id: Uuid,
    old_owner_ids: &BTreeSet<Uuid>,
    live_owner_ids: &BTreeSet<Uuid>,
) -> Result<()> {
    let unexpected: Vec<Uuid> = old_owner_ids.difference(live_owner_ids).copied().collect();
    let missing: Vec<Uuid> = live_owner_ids.difference(old_owner_ids).copied().collect();
    if unexpected.is_empty() && missing.is_empty() {
        return Ok(());
    }
    Err(TransferError::OwnerSetMismatch {
        property_id,
        unexpected,
        missing,
    })
}

/// Ownership changes applied by a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub transfer_id: Uuid,
    pub property_id: Uuid,
    /// OLD roster; these live-ownership rows are removed
    pub outgoing: Vec<Uuid>,
    /// NEW roster; these rows are inserted if absent
    pub incoming: Vec<Uuid>,
}

impl SwapPlan {
    pub fn from_participants(
        transfer_id: Uuid,
        property_id: Uuid,
        participants: &[TransferParticipant],
    ) -> Self {
        Self {
            transfer_id,
            property_id,
            outgoing: owners_with_role(participants, Role::Old).into_iter().collect(),
            incoming: owners_with_role(participants, Role::New).into_iter().collect(),
        }
    }

    /// Apply to a set of current owners
    pub fn apply_to(&self, owners: &BTreeSet<Uuid>) -> BTreeSet<Uuid> {
        let mut next: BTreeSet<Uuid> = owners
            .iter()
            .filter(|id| !self.outgoing.contains(*id))
            .copied()
            .collect();
        next.extend(self.incoming.iter().copied());
        next
    }
}
