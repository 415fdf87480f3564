pub mod memory;
pub mod postgres;
pub mod transaction_manager;

pub use memory::MemoryTransferStore;
pub use postgres::PostgresTransferStore;
pub use transaction_manager::{ManagedTransaction, TransactionManager, TransactionScope};
