pub mod code_generator;
pub mod pin;
pub mod signer;

pub use code_generator::{BATCH_ID_ALPHABET, generate_batch_id, generate_six_digit_code};
pub use pin::*;
pub use signer::*;
