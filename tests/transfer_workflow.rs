use deedshift::domain::{OwnerSummary, PropertySummary};
use deedshift::{
    MemoryTransferStore, TransferError, TransferRepository, TransferService, TransferStatus,
};
use std::collections::BTreeSet;
use uuid::Uuid;

struct World {
    store: MemoryTransferStore,
    service: TransferService,
    property: Uuid,
}

async fn world(current_owners: &[Uuid]) -> World {
    let store = MemoryTransferStore::new();
    let property = Uuid::new_v4();
    store
        .add_property(
            PropertySummary {
                property_id: property,
                name: "12 Elm Street".to_string(),
                address: Some("12 Elm Street, Springfield".to_string()),
            },
            current_owners,
        )
        .await;
    let service = TransferService::from_store(store.clone());
    World {
        store,
        service,
        property,
    }
}

fn owners(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

/// Example A: {A,B} -> {B,C}, everyone approves.
#[tokio::test]
async fn unanimous_approval_moves_ownership_to_new_roster() {
    let ids = owners(3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    let w = world(&[a, b]).await;

    let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();

    assert!(!w.service.approve(transfer.id, a).await.unwrap().all_approved);
    assert!(!w.service.approve(transfer.id, b).await.unwrap().all_approved);
    let last = w.service.approve(transfer.id, c).await.unwrap();

    assert!(last.all_approved);
    assert_eq!(last.status, TransferStatus::Approved);
    assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([b, c]));
    assert_eq!(w.store.swap_count().await, 1);
}

/// Example B: first vote is a rejection.
#[tokio::test]
async fn first_rejection_declines_and_freezes_transfer() {
    let ids = owners(3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    let w = world(&[a, b]).await;

    let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();
    let outcome = w.service.reject(transfer.id, a).await.unwrap();
    assert_eq!(outcome.status, TransferStatus::Declined);

    for owner in [b, c] {
        let err = w.service.approve(transfer.id, owner).await.unwrap_err();
        assert!(matches!(err, TransferError::Conflict(_)), "got {err:?}");
    }
    // a repeat of the same rejection is also refused once terminal
    assert!(w.service.reject(transfer.id, a).await.unwrap_err().is_conflict());

    assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([a, b]));
    let stored = w.store.get_transfer(transfer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransferStatus::Declined);
}

/// Example C: a vote from someone on neither roster.
#[tokio::test]
async fn outsider_vote_is_not_found() {
    let ids = owners(4);
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
    let w = world(&[a, b]).await;

    let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();
    let err = w.service.approve(transfer.id, d).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn declined_property_can_be_transferred_again() {
    let ids = owners(2);
    let (a, c) = (ids[0], ids[1]);
    let w = world(&[a]).await;

    let first = w.service.initiate(w.property, &[a], &[c]).await.unwrap();
    assert!(w.service.initiate(w.property, &[a], &[c]).await.unwrap_err().is_conflict());
    w.service.reject(first.id, c).await.unwrap();

    let second = w.service.initiate(w.property, &[a], &[c]).await.unwrap();
    w.service.approve(second.id, a).await.unwrap();
    w.service.approve(second.id, c).await.unwrap();
    assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([c]));

    // the old owner set is now stale
    let err = w.service.initiate(w.property, &[a], &[a]).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn interrupted_rejection_is_invisible_until_retried() {
    let ids = owners(3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    let w = world(&[a, b]).await;

    let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();
    w.store.fail_next_vote().await;
    let err = w.service.reject(transfer.id, a).await.unwrap_err();
    assert!(err.is_retryable());

    // neither the REJECTED row nor the status change is visible
    let views = w.service.list_for_owner(a).await.unwrap();
    assert_eq!(views[0].transfer_status, TransferStatus::Pending);
    assert_eq!(views[0].this_owner_vote, Some(deedshift::AcceptStatus::Pending));

    let outcome = w.service.reject(transfer.id, a).await.unwrap();
    assert_eq!(outcome.status, TransferStatus::Declined);
    let views = w.service.list_for_owner(a).await.unwrap();
    assert_eq!(views[0].transfer_status, TransferStatus::Declined);
    assert_eq!(views[0].this_owner_vote, Some(deedshift::AcceptStatus::Rejected));
    assert!(w.service.approve(transfer.id, c).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn failed_swap_rolls_back_and_can_be_retried_by_revoting() {
    let ids = owners(2);
    let (a, c) = (ids[0], ids[1]);
    let w = world(&[a]).await;

    let transfer = w.service.initiate(w.property, &[a], &[c]).await.unwrap();
    w.service.approve(transfer.id, a).await.unwrap();

    w.store.fail_next_swap().await;
    let err = w.service.approve(transfer.id, c).await.unwrap_err();
    assert!(matches!(err, TransferError::Transaction(_)));

    let stored = w.store.get_transfer(transfer.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransferStatus::Pending);
    assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([a]));

    let retried = w.service.approve(transfer.id, c).await.unwrap();
    assert_eq!(retried.status, TransferStatus::Approved);
    assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([c]));
}

/// Many callers observe consensus at once; the swap still runs exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_approvals_swap_exactly_once() {
    let old = owners(4);
    let incoming = owners(2);
    let w = world(&old).await;

    let mut new_roster = vec![old[0]];
    new_roster.extend(&incoming);
    let transfer = w.service.initiate(w.property, &old, &new_roster).await.unwrap();

    // everyone but one continuing owner approves up front
    for owner in old.iter().skip(1).chain(incoming.iter()) {
        w.service.approve(transfer.id, *owner).await.unwrap();
    }

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let service = w.service.clone();
        let (transfer_id, owner) = (transfer.id, old[0]);
        tasks.spawn(async move { service.approve(transfer_id, owner).await });
    }

    let mut approved = 0;
    let mut swaps_applied = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome.status, TransferStatus::Approved);
                approved += 1;
                if outcome.swap_applied {
                    swaps_applied += 1;
                }
            }
            Err(e) => assert!(e.is_conflict(), "unexpected error {e:?}"),
        }
    }

    assert!(approved >= 1);
    assert_eq!(swaps_applied, 1);
    assert_eq!(w.store.swap_count().await, 1);
    assert_eq!(
        w.store.owners_of(w.property).await,
        new_roster.iter().copied().collect::<BTreeSet<_>>()
    );
}

/// A rejection racing the final approval: exactly one terminal state wins and
/// live ownership always agrees with it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reject_racing_final_approval_has_single_winner() {
    for _ in 0..25 {
        let ids = owners(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let w = world(&[a, b]).await;
        let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();
        w.service.approve(transfer.id, b).await.unwrap();
        w.service.approve(transfer.id, c).await.unwrap();

        let approver = w.service.clone();
        let rejecter = w.service.clone();
        let id = transfer.id;
        let (approve, reject) = tokio::join!(
            tokio::spawn(async move { approver.approve(id, a).await }),
            tokio::spawn(async move { rejecter.reject(id, a).await }),
        );
        let (approve, reject) = (approve.unwrap(), reject.unwrap());

        let stored = w.store.get_transfer(id).await.unwrap().unwrap();
        match stored.status {
            TransferStatus::Approved => {
                assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([b, c]));
                assert_eq!(w.store.swap_count().await, 1);
                assert!(reject.is_err() || reject.unwrap().status == TransferStatus::Approved);
            }
            TransferStatus::Declined => {
                assert_eq!(w.store.owners_of(w.property).await, BTreeSet::from([a, b]));
                assert_eq!(w.store.swap_count().await, 0);
                assert!(approve.is_err() || !approve.unwrap().all_approved);
            }
            TransferStatus::Pending => panic!("transfer left pending"),
        }
    }
}

#[tokio::test]
async fn listing_merges_continuing_owner_and_hydrates_roster() {
    let ids = owners(3);
    let (a, b, c) = (ids[0], ids[1], ids[2]);
    let w = world(&[a, b]).await;
    for id in [a, b, c] {
        w.store
            .add_owner(OwnerSummary {
                owner_id: id,
                first_name: Some("Pat".to_string()),
                last_name: Some("Doe".to_string()),
                email: Some(format!("{}@example.com", id.simple())),
            })
            .await;
    }

    let transfer = w.service.initiate(w.property, &[a, b], &[b, c]).await.unwrap();
    w.service.approve(transfer.id, b).await.unwrap();

    let views = w.service.list_for_owner(b).await.unwrap();
    assert_eq!(views.len(), 1);
    let view = &views[0];
    assert_eq!(view.transfer_id, transfer.id);
    assert_eq!(view.property_name.as_deref(), Some("12 Elm Street"));
    assert_eq!(view.this_owner_vote, Some(deedshift::AcceptStatus::Approved));
    assert_eq!(view.old_owners.len(), 2);
    assert_eq!(view.new_owners.len(), 2);
    assert!(view
        .old_owners
        .iter()
        .chain(view.new_owners.iter())
        .all(|m| m.owner.email.is_some()));

    let json = serde_json::to_value(view).unwrap();
    assert_eq!(json["transferStatus"], "PENDING");
    assert_eq!(json["thisOwnerVote"], "APPROVED");
    assert!(json["oldOwners"][0].get("firstName").is_some());

    assert!(w.service.list_for_owner(Uuid::new_v4()).await.unwrap().is_empty());
    assert_eq!(w.service.list_for_property(w.property).await.unwrap().len(), 1);
}
