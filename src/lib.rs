pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod repository;
pub mod retry;
pub mod services;

pub use adapters::{MemoryTransferStore, PostgresTransferStore};
pub use config::AppConfig;
pub use domain::{
    AcceptStatus, ConsensusEvaluator, Decision, Role, RoleSet, Transfer, TransferParticipant,
    TransferStatus, TransferView, VoteOutcome,
};
pub use error::{Result, TransferError};
pub use repository::{Directory, SwapCommit, TransferRepository};
pub use retry::{with_retry, RetryConfig};
pub use services::{
    ConsentTracker, OwnershipSwapExecutor, TransferInitiator, TransferQueryService,
    TransferService,
};
