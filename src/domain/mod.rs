pub mod consensus;
pub mod participant;
pub mod transfer;
pub mod view;

pub use consensus::*;
pub use participant::*;
pub use transfer::*;
pub use view::*;
