//! 시장 데이터 공급 인터페이스와 스냅샷 캐시

pub mod provider;

pub use provider::{MarketDataCache, MarketDataFeed};
