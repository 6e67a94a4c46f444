//! POV(Percentage of Volume) 주문 분할 알고리즘 구현
//!
//! 관측된 시장 거래량의 일정 비율을 따라가며, 진행 속도에 따라 참여율을 조정한다.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{cap_quantity, limit_price, require_snapshot, SliceCalculator, SliceDecision, SlicePlan};
use crate::error::TradingError;
use crate::models::instance::AlgorithmInstance;
use crate::models::market_data::MarketSnapshot;
use crate::models::order::{OrderSide, OrderType};
use crate::models::params::PovParameters;

/// 뒤처졌을 때 참여율 배수
const BEHIND_MULTIPLIER: f64 = 1.5;
/// 앞섰을 때 참여율 배수
const AHEAD_MULTIPLIER: f64 = 0.7;
/// 스프레드 대비 중간값 쪽 조정 비율
const SPREAD_SHADE: f64 = 0.1;

/// 진행 상황에 따른 조정 참여율 (%)
pub fn adjusted_participation_rate(params: &PovParameters, progress: f64, remaining: u64, total: u64) -> f64 {
  if progress < 0.5 && remaining as f64 > 0.6 * total as f64 {
    (params.target_participation_rate * BEHIND_MULTIPLIER).min(params.max_participation_rate)
  } else if progress > 0.8 {
    (params.target_participation_rate * AHEAD_MULTIPLIER).max(params.min_participation_rate)
  } else {
    params.target_participation_rate
  }
}

/// POV 기반 주문 분할기
pub struct PovSplitter {
  params: PovParameters,
  interval: Duration,
}

impl PovSplitter {
  pub fn new(params: PovParameters, interval: Duration) -> Self {
    PovSplitter { params, interval }
  }

  /// 같은 쪽 최우선 호가에서 스프레드의 10% 만큼 중간값 쪽으로 조정. 중간값을 넘지 않는다.
  pub fn limit_price(side: OrderSide, snapshot: &MarketSnapshot) -> f64 {
    let shade = snapshot.spread() * SPREAD_SHADE;
    let mid = snapshot.mid();
    match side {
      OrderSide::Buy if snapshot.spread() > 0.0 => (snapshot.bid + shade).min(mid),
      OrderSide::Sell if snapshot.spread() > 0.0 => (snapshot.ask - shade).max(mid),
      _ => mid,
    }
  }
}

impl SliceCalculator for PovSplitter {
  fn interval(&self) -> Duration {
    self.interval
  }

  /// 첫 틱은 거래량을 관측한 뒤인 한 간격 후
  fn initial_delay(&self) -> Duration {
    self.interval
  }

  fn next_slice(
    &self,
    instance: &AlgorithmInstance,
    snapshot: Option<&MarketSnapshot>,
    _now: DateTime<Utc>,
  ) -> Result<SliceDecision, TradingError> {
    let snapshot = require_snapshot(instance, snapshot)?;

    let mut rate = adjusted_participation_rate(
      &self.params,
      instance.current_progress,
      instance.remaining_quantity,
      instance.total_quantity(),
    );
    if let Some(max) = instance.parameters.max_participation_rate {
      rate = rate.min(max);
    }

    let target = (snapshot.volume * rate / 100.0).floor().max(0.0) as u64;
    let quantity = cap_quantity(target, instance);
    if quantity == 0 {
      return Ok(SliceDecision::Skip("participation target rounds to zero"));
    }

    log::debug!("{} POV 참여율 {:.2}% - 시장 거래량 {} - 수량 {}", instance.id, rate, snapshot.volume, quantity);

    let price = limit_price(Self::limit_price(instance.parameters.side, snapshot), instance);

    Ok(SliceDecision::Place(SlicePlan {
      quantity,
      order_type: OrderType::Limit,
      price: Some(price),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::instance::InstanceId;
  use crate::models::params::{AlgorithmKind, AlgorithmParameters};
  use chrono::Duration as ChronoDuration;

  fn params(target: f64, min: f64, max: f64) -> PovParameters {
    PovParameters {
      target_participation_rate: target,
      min_participation_rate: min,
      max_participation_rate: max,
      adjustment_factor: 1.0,
    }
  }

  fn instance(side: OrderSide, pov: PovParameters) -> AlgorithmInstance {
    let start = Utc::now();
    let p = AlgorithmParameters::new(
      "TEST",
      side,
      1000,
      start,
      start + ChronoDuration::minutes(30),
      AlgorithmKind::Pov(pov),
    );
    AlgorithmInstance::new(InstanceId::generate(), p, start)
  }

  #[test]
  fn test_rate_when_behind() {
    let p = params(10.0, 5.0, 25.0);
    assert_eq!(adjusted_participation_rate(&p, 0.1, 900, 1000), 15.0);

    let capped = params(10.0, 5.0, 12.0);
    assert_eq!(adjusted_participation_rate(&capped, 0.1, 900, 1000), 12.0);
  }

  #[test]
  fn test_rate_when_ahead_and_on_pace() {
    let p = params(10.0, 8.0, 25.0);
    assert_eq!(adjusted_participation_rate(&p, 0.85, 150, 1000), 8.0);

    let p = params(10.0, 5.0, 25.0);
    assert!((adjusted_participation_rate(&p, 0.85, 150, 1000) - 7.0).abs() < 1e-9);
    assert_eq!(adjusted_participation_rate(&p, 0.6, 400, 1000), 10.0);
    // 진행률은 낮지만 잔량이 60% 이하
    assert_eq!(adjusted_participation_rate(&p, 0.45, 550, 1000), 10.0);
  }

  #[test]
  fn test_pov_slice_and_price() {
    let splitter = PovSplitter::new(params(10.0, 5.0, 25.0), Duration::from_secs(30));
    let inst = instance(OrderSide::Buy, params(10.0, 5.0, 25.0));
    let snap = MarketSnapshot::new("TEST", 100.0, 99.0, 101.0, 2000.0, Utc::now());

    // 시작 직후는 뒤처진 상태: 15% * 2000 = 300
    match splitter.next_slice(&inst, Some(&snap), Utc::now()).unwrap() {
      SliceDecision::Place(plan) => {
        assert_eq!(plan.quantity, 300);
        assert_eq!(plan.order_type, OrderType::Limit);
        assert!((plan.price.unwrap() - 99.2).abs() < 1e-9);
      }
      other => panic!("unexpected {:?}", other),
    }

    assert_eq!(splitter.initial_delay(), Duration::from_secs(30));
  }

  #[test]
  fn test_sell_price_shaded_down_toward_mid() {
    let snap = MarketSnapshot::new("TEST", 100.0, 99.0, 101.0, 2000.0, Utc::now());
    assert!((PovSplitter::limit_price(OrderSide::Sell, &snap) - 100.8).abs() < 1e-9);

    let no_quotes = MarketSnapshot::new("TEST", 100.0, 0.0, 0.0, 2000.0, Utc::now());
    assert_eq!(PovSplitter::limit_price(OrderSide::Sell, &no_quotes), 100.0);
  }

  #[test]
  fn test_requires_market_data() {
    let splitter = PovSplitter::new(params(10.0, 5.0, 25.0), Duration::from_secs(30));
    let inst = instance(OrderSide::Buy, params(10.0, 5.0, 25.0));
    assert!(matches!(
      splitter.next_slice(&inst, None, Utc::now()),
      Err(TradingError::MarketDataUnavailable(_))
    ));
  }

  #[test]
  fn test_thin_volume_skips() {
    let splitter = PovSplitter::new(params(10.0, 5.0, 25.0), Duration::from_secs(30));
    let inst = instance(OrderSide::Buy, params(10.0, 5.0, 25.0));
    let snap = MarketSnapshot::new("TEST", 100.0, 99.0, 101.0, 5.0, Utc::now());
    assert!(matches!(splitter.next_slice(&inst, Some(&snap), Utc::now()).unwrap(), SliceDecision::Skip(_)));
  }
}
