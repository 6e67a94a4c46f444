//! 도메인 데이터 모델

pub mod instance;
pub mod market_data;
pub mod order;
pub mod params;
