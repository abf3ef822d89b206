pub mod encoding;
pub mod errors;
pub mod stake_weight;
