pub mod raffle_sessions;

pub use raffle_sessions as raffle_session_entity;
