//! Transaction Manager for atomic transfer updates
//!
//! Provides scoped transactions for operations that span the transfer, roster
//! and live-ownership tables. A transaction that is dropped without commit is
//! rolled back by sqlx.

use crate::error::{Result, TransferError};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument, warn};

/// Transaction scope identifier for tracking and debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionScope {
    /// Transfer row plus both rosters
    Initiate,
    /// Roster update under a shared lock on the transfer row
    Vote,
    /// Status CAS plus live-ownership replacement
    OwnershipSwap,
}

impl std::fmt::Display for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiate => write!(f, "initiate"),
            Self::Vote => write!(f, "vote"),
            Self::OwnershipSwap => write!(f, "ownership_swap"),
        }
    }
}

/// Transaction Manager for atomic database operations
#[derive(Clone)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a new transaction with scope tracking
    #[instrument(skip(self))]
    pub async fn begin(&self, scope: TransactionScope) -> Result<ManagedTransaction> {
        let tx = self.pool.begin().await?;
        debug!("Started transaction for scope: {}", scope);
        Ok(ManagedTransaction {
            tx: Some(tx),
            scope,
            committed: false,
        })
    }
}

/// A managed transaction with automatic rollback on drop
pub struct ManagedTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    scope: TransactionScope,
    committed: bool,
}

impl ManagedTransaction {
    /// Connection for executing queries inside the transaction.
    /// Use as: `.execute(tx.executor()?).await`
    pub fn executor(&mut self) -> Result<&mut sqlx::PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(TransferError::Transaction(format!(
                "transaction for scope {} already finished",
                self.scope
            ))),
        }
    }

    /// Commit the transaction
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            self.committed = true;
            debug!("Committed transaction for scope: {}", self.scope);
        }
        Ok(())
    }

    /// Rollback the transaction explicitly
    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("Rolled back transaction for scope: {}", self.scope);
        }
        Ok(())
    }
}

impl Drop for ManagedTransaction {
    fn drop(&mut self) {
        if self.tx.is_some() && !self.committed {
            // sqlx rolls back on drop
            warn!(
                "Transaction for scope {} was dropped without commit - rolling back",
                self.scope
            );
        }
    }
}
