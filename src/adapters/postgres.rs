use crate::adapters::transaction_manager::{ManagedTransaction, TransactionManager, TransactionScope};
use crate::domain::{
    merge_entries, owners_with_role, verify_old_roster, AcceptStatus, ConsensusEvaluator,
    OwnerSummary, PropertySummary, Role, RosterEntry, SwapPlan, Transfer, TransferParticipant,
    TransferStatus,
};
use crate::error::{Result, TransferError};
use crate::repository::{Directory, SwapCommit, TransferRepository};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Postgres, Row};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// PostgreSQL storage adapter for transfers, rosters and live ownership
#[derive(Clone)]
pub struct PostgresTransferStore {
    pool: PgPool,
    tx_manager: TransactionManager,
}

fn roster_table(role: Role) -> &'static str {
    match role {
        Role::Old => "old_owner_roster",
        Role::New => "new_owner_roster",
    }
}

fn transfer_from_row(row: &PgRow) -> Result<Transfer> {
    let status: String = row.try_get("status")?;
    Ok(Transfer {
        id: row.try_get("transfer_id")?,
        property_id: row.try_get("property_id")?,
        status: TransferStatus::try_from(status.as_str()).map_err(TransferError::Database)?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_participants<'e, E>(executor: E, transfer_id: Uuid) -> Result<Vec<TransferParticipant>>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(
        r#"
        SELECT 'OLD' AS role, owner_id, status FROM old_owner_roster WHERE transfer_id = $1
        UNION ALL
        SELECT 'NEW' AS role, owner_id, status FROM new_owner_roster WHERE transfer_id = $1
        "#,
    )
    .bind(transfer_id)
    .fetch_all(executor)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let role = match row.try_get::<String, _>("role")?.as_str() {
            "OLD" => Role::Old,
            _ => Role::New,
        };
        let status: String = row.try_get("status")?;
        entries.push(RosterEntry {
            transfer_id,
            owner_id: row.try_get("owner_id")?,
            role,
            accept_status: AcceptStatus::try_from(status.as_str())
                .map_err(TransferError::Database)?,
        });
    }

    Ok(merge_entries(entries))
}

async fn fetch_status<'e, E>(executor: E, transfer_id: Uuid) -> Result<Option<TransferStatus>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query("SELECT status FROM transfers WHERE transfer_id = $1")
        .bind(transfer_id)
        .fetch_optional(executor)
        .await?;

    row.map(|r| {
        let status: String = r.try_get("status")?;
        TransferStatus::try_from(status.as_str()).map_err(TransferError::Database)
    })
    .transpose()
}

impl PostgresTransferStore {
    /// Create a new PostgreSQL store
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            tx_manager: TransactionManager::new(pool.clone()),
            pool,
        }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Steps 1-3 of the swap; the caller owns commit/rollback.
    async fn swap_in(&self, tx: &mut ManagedTransaction, plan: &SwapPlan) -> Result<SwapCommit> {
        let won = sqlx::query(
            r#"
            UPDATE transfers SET status = 'APPROVED'
            WHERE transfer_id = $1 AND status = 'PENDING'
            RETURNING property_id
            "#,
        )
        .bind(plan.transfer_id)
        .fetch_optional(tx.executor()?)
        .await?;

        let Some(row) = won else {
            let status = fetch_status(tx.executor()?, plan.transfer_id)
                .await?
                .ok_or_else(|| TransferError::NotFound(format!("transfer {}", plan.transfer_id)))?;
            return Ok(SwapCommit::AlreadyResolved(status));
        };

        let property_id: Uuid = row.try_get("property_id")?;
        if property_id != plan.property_id {
            return Err(TransferError::Transaction(format!(
                "swap plan targets property {} but transfer {} is for {}",
                plan.property_id, plan.transfer_id, property_id
            )));
        }

        // Votes hold FOR SHARE on the transfer row, so every vote committed
        // before our UPDATE is visible here and none can land after it.
        let participants = fetch_participants(tx.executor()?, plan.transfer_id).await?;
        if !ConsensusEvaluator::is_unanimous(&participants) {
            return Ok(SwapCommit::ConsensusLost);
        }

        let removed = sqlx::query(
            "DELETE FROM live_ownership WHERE property_id = $1 AND owner_id = ANY($2)",
        )
        .bind(plan.property_id)
        .bind(&plan.outgoing[..])
        .execute(tx.executor()?)
        .await?
        .rows_affected();

        let inserted = sqlx::query(
            r#"
            INSERT INTO live_ownership (property_id, owner_id)
            SELECT $1, owner_id FROM UNNEST($2::uuid[]) AS owner_id
            ON CONFLICT (property_id, owner_id) DO NOTHING
            "#,
        )
        .bind(plan.property_id)
        .bind(&plan.incoming[..])
        .execute(tx.executor()?)
        .await?
        .rows_affected();

        debug!(
            "Swap for transfer {} removed {} and inserted {} ownership rows",
            plan.transfer_id, removed, inserted
        );
        Ok(SwapCommit::Applied)
    }
}

#[async_trait]
impl TransferRepository for PostgresTransferStore {
    async fn get_transfer(&self, transfer_id: Uuid) -> Result<Option<Transfer>> {
        let row = sqlx::query(
            r#"
            SELECT transfer_id, property_id, status, created_at
            FROM transfers WHERE transfer_id = $1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn pending_transfer_for_property(&self, property_id: Uuid) -> Result<Option<Transfer>> {
        let row = sqlx::query(
            r#"
            SELECT transfer_id, property_id, status, created_at
            FROM transfers
            WHERE property_id = $1 AND status = 'PENDING'
            LIMIT 1
            "#,
        )
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn live_owners(&self, property_id: Uuid) -> Result<BTreeSet<Uuid>> {
        let rows = sqlx::query("SELECT owner_id FROM live_ownership WHERE property_id = $1")
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| r.try_get::<Uuid, _>("owner_id").map_err(TransferError::from))
            .collect()
    }

    #[instrument(skip(self, participants), fields(transfer_id = %transfer.id))]
    async fn create_transfer(
        &self,
        transfer: &Transfer,
        participants: &[TransferParticipant],
    ) -> Result<Transfer> {
        let mut tx = self.tx_manager.begin(TransactionScope::Initiate).await?;

        sqlx::query(
            r#"
            INSERT INTO transfers (transfer_id, property_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.property_id)
        .bind(transfer.status.as_str())
        .bind(transfer.created_at)
        .execute(tx.executor()?)
        .await
        .map_err(|e| match TransferError::from(e) {
            // transfers_one_pending_per_property
            TransferError::Conflict(_) => TransferError::Conflict(format!(
                "property {} already has a pending transfer",
                transfer.property_id
            )),
            other => other,
        })?;

        // A swap that committed while our insert waited on the pending-index
        // check is visible to this statement.
        let live = sqlx::query("SELECT owner_id FROM live_ownership WHERE property_id = $1")
            .bind(transfer.property_id)
            .fetch_all(tx.executor()?)
            .await?
            .iter()
            .map(|r| r.try_get::<Uuid, _>("owner_id"))
            .collect::<std::result::Result<BTreeSet<Uuid>, _>>()?;
        if let Err(e) = verify_old_roster(
            transfer.property_id,
            &owners_with_role(participants, Role::Old),
            &live,
        ) {
            tx.rollback().await?;
            return Err(e);
        }

        for participant in participants {
            for entry in participant.entries() {
                let sql = format!(
                    "INSERT INTO {} (transfer_id, owner_id, status) VALUES ($1, $2, $3)",
                    roster_table(entry.role)
                );
                sqlx::query(&sql)
                    .bind(entry.transfer_id)
                    .bind(entry.owner_id)
                    .bind(entry.accept_status.as_str())
                    .execute(tx.executor()?)
                    .await?;
            }
        }

        tx.commit().await?;
        debug!("Inserted transfer with {} participants", participants.len());
        Ok(transfer.clone())
    }

    async fn participants(&self, transfer_id: Uuid) -> Result<Vec<TransferParticipant>> {
        fetch_participants(&self.pool, transfer_id).await
    }

    #[instrument(skip(self))]
    async fn record_vote(
        &self,
        transfer_id: Uuid,
        owner_id: Uuid,
        status: AcceptStatus,
    ) -> Result<TransferParticipant> {
        let mut tx = self.tx_manager.begin(TransactionScope::Vote).await?;

        // Approvals share the row lock and the terminal CAS waits for them.
        // A rejection changes the status itself, so it locks exclusively.
        let lock_sql = if status == AcceptStatus::Rejected {
            "SELECT status FROM transfers WHERE transfer_id = $1 FOR UPDATE"
        } else {
            "SELECT status FROM transfers WHERE transfer_id = $1 FOR SHARE"
        };
        let locked = sqlx::query(lock_sql)
            .bind(transfer_id)
            .fetch_optional(tx.executor()?)
            .await?;
        let Some(locked) = locked else {
            tx.rollback().await?;
            return Err(TransferError::NotFound(format!("transfer {}", transfer_id)));
        };
        let transfer_status = TransferStatus::try_from(locked.try_get::<String, _>("status")?.as_str())
            .map_err(TransferError::Database)?;

        let participant = fetch_participants(tx.executor()?, transfer_id)
            .await?
            .into_iter()
            .find(|p| p.owner_id == owner_id);
        let Some(mut participant) = participant else {
            tx.rollback().await?;
            return Err(TransferError::NotFound(format!(
                "owner {} is not party to transfer {}",
                owner_id, transfer_id
            )));
        };

        if transfer_status.is_terminal() {
            tx.rollback().await?;
            return Err(TransferError::Conflict(format!(
                "transfer {} already resolved ({})",
                transfer_id, transfer_status
            )));
        }

        for role in participant.roles.iter() {
            let sql = format!(
                "UPDATE {} SET status = $3 WHERE transfer_id = $1 AND owner_id = $2",
                roster_table(role)
            );
            sqlx::query(&sql)
                .bind(transfer_id)
                .bind(owner_id)
                .bind(status.as_str())
                .execute(tx.executor()?)
                .await?;
        }

        if status == AcceptStatus::Rejected {
            // Row is held FOR UPDATE and was PENDING, so this always lands.
            sqlx::query(
                r#"
                UPDATE transfers SET status = 'DECLINED'
                WHERE transfer_id = $1 AND status = 'PENDING'
                "#,
            )
            .bind(transfer_id)
            .execute(tx.executor()?)
            .await?;
        }

        tx.commit().await?;
        participant.accept_status = status;
        Ok(participant)
    }

    #[instrument(skip(self, plan), fields(transfer_id = %plan.transfer_id))]
    async fn apply_swap(&self, plan: &SwapPlan) -> Result<SwapCommit> {
        let mut tx = self.tx_manager.begin(TransactionScope::OwnershipSwap).await?;

        match self.swap_in(&mut tx, plan).await {
            Ok(SwapCommit::Applied) => {
                tx.commit().await.map_err(|e| {
                    TransferError::Transaction(format!(
                        "commit of swap for transfer {} failed: {}",
                        plan.transfer_id, e
                    ))
                })?;
                Ok(SwapCommit::Applied)
            }
            Ok(other) => {
                tx.rollback().await?;
                Ok(other)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Explicit rollback failed: {}", rollback_err);
                }
                match e {
                    TransferError::NotFound(_) | TransferError::Transaction(_) => Err(e),
                    other => Err(TransferError::Transaction(format!(
                        "swap for transfer {} rolled back: {}",
                        plan.transfer_id, other
                    ))),
                }
            }
        }
    }

    async fn transfers_for_owner(&self, owner_id: Uuid) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            r#"
            SELECT t.transfer_id, t.property_id, t.status, t.created_at
            FROM transfers t
            WHERE EXISTS (
                SELECT 1 FROM old_owner_roster o
                WHERE o.transfer_id = t.transfer_id AND o.owner_id = $1
            ) OR EXISTS (
                SELECT 1 FROM new_owner_roster n
                WHERE n.transfer_id = t.transfer_id AND n.owner_id = $1
            )
            ORDER BY t.created_at DESC, t.transfer_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transfer_from_row).collect()
    }

    async fn transfers_for_property(&self, property_id: Uuid) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            r#"
            SELECT transfer_id, property_id, status, created_at
            FROM transfers
            WHERE property_id = $1
            ORDER BY created_at DESC, transfer_id
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transfer_from_row).collect()
    }
}

#[async_trait]
impl Directory for PostgresTransferStore {
    async fn property(&self, property_id: Uuid) -> Result<Option<PropertySummary>> {
        let row = sqlx::query("SELECT property_id, name, address FROM properties WHERE property_id = $1")
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| -> Result<PropertySummary> {
            Ok(PropertySummary {
                property_id: r.try_get("property_id")?,
                name: r.try_get("name")?,
                address: r.try_get("address")?,
            })
        })
        .transpose()
    }

    async fn owners(&self, owner_ids: &[Uuid]) -> Result<Vec<OwnerSummary>> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT o.owner_id, u.first_name, u.last_name, u.email
            FROM owners o
            LEFT JOIN users u ON u.user_id = o.user_id
            WHERE o.owner_id = ANY($1)
            "#,
        )
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<OwnerSummary> {
                Ok(OwnerSummary {
                    owner_id: r.try_get("owner_id")?,
                    first_name: r.try_get("first_name")?,
                    last_name: r.try_get("last_name")?,
                    email: r.try_get("email")?,
                })
            })
            .collect()
    }
}
