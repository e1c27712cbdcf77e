pub mod book;
pub mod order;

pub use book::PaperOrderBook;
pub use order::{OrderId, OrderStatus, PaperOrder};

use crate::strategy::StrategyKind;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("{strategy} already holds a position on {market_id}")]
    DuplicatePosition {
        strategy: StrategyKind,
        market_id: String,
    },

    #[error("order not found: {0}")]
    OrderNotFound(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
