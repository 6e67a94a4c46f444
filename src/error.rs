/**
* filename : error
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use thiserror::Error;

use crate::models::instance::{AlgorithmStatus, InstanceId};
use crate::models::order::OrderId;

#[derive(Error, Debug, Clone)]
pub enum TradingError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Invalid state for {operation} on {id}: {status:?}")]
    InvalidState {
        id: InstanceId,
        operation: &'static str,
        status: AlgorithmStatus,
    },

    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Exchange error: {0}")]
    ExchangeError(String),

    #[error("Timed out after {0}ms: {1}")]
    Timeout(u64, String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TradingError {
    /// 주문 게이트웨이 실패 여부 (생성/취소/타임아웃)
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            TradingError::ExchangeError(_) | TradingError::Timeout(..) | TradingError::OrderNotFound(_)
        )
    }

    /// 시장 데이터 부재로 인한 실패 여부
    pub fn is_market_data(&self) -> bool {
        matches!(self, TradingError::MarketDataUnavailable(_))
    }
}

impl From<std::io::Error> for TradingError {
    fn from(e: std::io::Error) -> Self {
        TradingError::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(e: serde_json::Error) -> Self {
        TradingError::SerializationError(e.to_string())
    }
}
