use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    OwnerSummary, PropertySummary, Role, RosterMember, Transfer, TransferParticipant,
    TransferView,
};
use crate::error::Result;
use crate::repository::{Directory, TransferRepository};

/// Read-only projections of transfers for display
#[derive(Clone)]
pub struct TransferQueryService {
    repo: Arc<dyn TransferRepository>,
    directory: Arc<dyn Directory>,
}

impl TransferQueryService {
    pub fn new(repo: Arc<dyn TransferRepository>, directory: Arc<dyn Directory>) -> Self {
        Self { repo, directory }
    }

    /// One view per transfer the owner is on either roster of, newest first
    #[instrument(skip(self))]
    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<TransferView>> {
        let transfers = self.repo.transfers_for_owner(owner_id).await?;
        self.project(transfers, Some(owner_id)).await
    }

    /// Every transfer of a property, newest first
    #[instrument(skip(self))]
    pub async fn list_for_property(&self, property_id: Uuid) -> Result<Vec<TransferView>> {
        let transfers = self.repo.transfers_for_property(property_id).await?;
        self.project(transfers, None).await
    }

    async fn project(
        &self,
        transfers: Vec<Transfer>,
        viewer: Option<Uuid>,
    ) -> Result<Vec<TransferView>> {
        let mut properties: HashMap<Uuid, Option<PropertySummary>> = HashMap::new();
        let mut views = Vec::with_capacity(transfers.len());

        for transfer in transfers {
            let participants = self.repo.participants(transfer.id).await?;

            let this_owner_vote = match viewer {
                Some(owner_id) => match participants.iter().find(|p| p.owner_id == owner_id) {
                    Some(p) => Some(p.accept_status),
                    None => {
                        debug!("Owner {} no longer on transfer {}", owner_id, transfer.id);
                        continue;
                    }
                },
                None => None,
            };

            if !properties.contains_key(&transfer.property_id) {
                let summary = self.directory.property(transfer.property_id).await?;
                properties.insert(transfer.property_id, summary);
            }
            let property = properties.get(&transfer.property_id).cloned().flatten();

            let (old_owners, new_owners) = self.hydrate(&participants).await?;

            views.push(TransferView {
                transfer_id: transfer.id,
                property_id: transfer.property_id,
                property_name: property.as_ref().map(|p| p.name.clone()),
                property_address: property.and_then(|p| p.address),
                transfer_status: transfer.status,
                this_owner_vote,
                old_owners,
                new_owners,
                created_at: transfer.created_at,
            });
        }

        views.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.transfer_id.cmp(&b.transfer_id))
        });
        Ok(views)
    }

    async fn hydrate(
        &self,
        participants: &[TransferParticipant],
    ) -> Result<(Vec<RosterMember>, Vec<RosterMember>)> {
        let ids: Vec<Uuid> = participants.iter().map(|p| p.owner_id).collect();
        let summaries: HashMap<Uuid, OwnerSummary> = self
            .directory
            .owners(&ids)
            .await?
            .into_iter()
            .map(|o| (o.owner_id, o))
            .collect();

        let member = |p: &TransferParticipant| RosterMember {
            owner: summaries
                .get(&p.owner_id)
                .cloned()
                .unwrap_or_else(|| OwnerSummary::unknown(p.owner_id)),
            vote: p.accept_status,
        };

        let old = participants
            .iter()
            .filter(|p| p.roles.contains(Role::Old))
            .map(member)
            .collect();
        let new = participants
            .iter()
            .filter(|p| p.roles.contains(Role::New))
            .map(member)
            .collect();
        Ok((old, new))
    }
}
