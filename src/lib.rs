//! 알고리즘 주문 실행 엔진 라이브러리
//!
//! 큰 부모 주문을 TWAP, VWAP, POV 알고리즘으로 하위 주문으로 나누어
//! 시간에 걸쳐 제출하고, 인스턴스 생명주기와 실행 결과를 관리합니다.

pub mod config;
pub mod core;
pub mod error;
pub mod exchange;
pub mod market_data;
pub mod models;
pub mod utils;

// 핵심 타입 재노출
pub use crate::config::Config;
pub use crate::core::{AlgorithmEvent, AlgorithmObserver, AlgorithmScheduler, ExecutionScorer, RegistryStatistics};
pub use crate::error::TradingError;
pub use crate::exchange::traits::OrderGateway;
pub use crate::market_data::{MarketDataCache, MarketDataFeed};
pub use crate::models::instance::{AlgorithmInstance, AlgorithmStatus, ExecutionResult, InstanceId};
pub use crate::models::market_data::MarketSnapshot;
pub use crate::models::order::{Order, OrderId, OrderRequest, OrderSide, OrderStatus, OrderType};
pub use crate::models::params::{
    AlgorithmKind, AlgorithmParameters, PovParameters, PriceLimit, TwapParameters, VolumeProfileEntry, VwapParameters,
};

/// 버전 정보
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 결과 타입 별칭
pub type Result<T> = std::result::Result<T, TradingError>;
