pub mod common;
pub mod credential;
pub mod session;
pub mod ticket;

pub use common::*;
pub use credential::*;
pub use session::*;
pub use ticket::*;
