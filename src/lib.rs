pub mod client;
pub mod engine;
pub mod execution;
pub mod market;
pub mod monitoring;
pub mod settlement;
pub mod strategy;
pub mod types;
pub mod utils;

pub use crate::types::*;
