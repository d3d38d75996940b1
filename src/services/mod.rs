pub mod ticket_ledger;
pub mod raffle_session;
pub mod session_store;
pub mod session_registry;

pub use ticket_ledger::*;
pub use raffle_session::*;
pub use session_store::*;
pub use session_registry::*;
