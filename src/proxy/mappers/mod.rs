// Response mappers

pub mod response;

pub use response::{transform, RevealMode, RevealPayload};
