//! 주문 실행 알고리즘의 핵심 구현체

pub mod callbacks;
pub mod execution_analyzer;
pub mod pov_splitter;
pub mod registry;
pub mod scheduler;
pub mod twap_splitter;
pub mod vwap_splitter;

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::TradingError;
use crate::models::instance::AlgorithmInstance;
use crate::models::market_data::MarketSnapshot;
use crate::models::order::OrderType;
use crate::models::params::AlgorithmKind;

/// 한 틱에서 낼 하위 주문 계획
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
  pub quantity: u64,
  pub order_type: OrderType,
  pub price: Option<f64>,
}

/// 분할 계산 결과
#[derive(Debug, Clone, PartialEq)]
pub enum SliceDecision {
  /// 주문 제출
  Place(SlicePlan),
  /// 이번 틱은 주문 없이 넘어감
  Skip(&'static str),
}

/// 알고리즘별 분할 계산기 인터페이스
pub trait SliceCalculator: Send + Sync {
  /// 틱 간격
  fn interval(&self) -> Duration;

  /// 시작 후 첫 틱까지 대기 시간
  fn initial_delay(&self) -> Duration {
    Duration::ZERO
  }

  /// 현재 인스턴스 상태와 시장 스냅샷으로 다음 하위 주문 계산
  fn next_slice(
    &self,
    instance: &AlgorithmInstance,
    snapshot: Option<&MarketSnapshot>,
    now: DateTime<Utc>,
  ) -> Result<SliceDecision, TradingError>;
}

/// 파라미터 종류에 맞는 분할 계산기 생성
pub fn calculator_for(kind: &AlgorithmKind, duration_secs: f64, config: &EngineConfig) -> Box<dyn SliceCalculator> {
  match kind {
    AlgorithmKind::Twap(params) => Box::new(twap_splitter::TwapSplitter::new(params.clone(), duration_secs)),
    AlgorithmKind::Vwap(params) => Box::new(vwap_splitter::VwapSplitter::new(
      params.clone(),
      Duration::from_secs(config.vwap_interval_secs),
    )),
    AlgorithmKind::Pov(params) => Box::new(pov_splitter::PovSplitter::new(
      params.clone(),
      Duration::from_secs(config.pov_interval_secs),
    )),
  }
}

/// 가용 수량(잔량 - 미체결 대기 수량)과 max_order_size 로 수량 상한 적용
pub(crate) fn cap_quantity(quantity: u64, instance: &AlgorithmInstance) -> u64 {
  let capped = quantity.min(instance.available_quantity());
  match instance.parameters.max_order_size {
    Some(max) => capped.min(max),
    None => capped,
  }
}

/// 시장 데이터가 필요한 계산에서 스냅샷 요구
pub(crate) fn require_snapshot<'a>(
  instance: &AlgorithmInstance,
  snapshot: Option<&'a MarketSnapshot>,
) -> Result<&'a MarketSnapshot, TradingError> {
  snapshot.ok_or_else(|| TradingError::MarketDataUnavailable(instance.parameters.symbol.clone()))
}

/// price_limit 이 있으면 가격 제한
pub(crate) fn limit_price(price: f64, instance: &AlgorithmInstance) -> f64 {
  match &instance.parameters.price_limit {
    Some(limit) => limit.clamp(price),
    None => price,
  }
}

// 핵심 타입 재노출
pub use callbacks::{AlgorithmEvent, AlgorithmObserver, CallbackDispatcher, EventBroadcaster};
pub use execution_analyzer::{ArrivalPriceScorer, ExecutionScorer, FixedRateScorer};
pub use pov_splitter::PovSplitter;
pub use registry::{InstanceRegistry, RegistryStatistics};
pub use scheduler::AlgorithmScheduler;
pub use twap_splitter::TwapSplitter;
pub use vwap_splitter::VwapSplitter;
