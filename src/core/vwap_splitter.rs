//! VWAP 기반 주문 분할 알고리즘 구현
//!
//! 분 단위 과거 거래량 프로필과 참여율에 맞춰 하위 주문 크기를 정하는 알고리즘

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{cap_quantity, limit_price, require_snapshot, SliceCalculator, SliceDecision, SlicePlan};
use crate::error::TradingError;
use crate::models::instance::AlgorithmInstance;
use crate::models::market_data::MarketSnapshot;
use crate::models::order::{OrderSide, OrderType};
use crate::models::params::{VolumeProfileEntry, VwapParameters};
use crate::utils::minute_of_day;

/// VWAP 기반 주문 분할기
pub struct VwapSplitter {
  /// VWAP 파라미터
  params: VwapParameters,
  /// 틱 간격
  interval: Duration,
}

impl VwapSplitter {
  /// 새 VWAP 분할기 생성
  pub fn new(params: VwapParameters, interval: Duration) -> Self {
    VwapSplitter { params, interval }
  }

  /// 현재 분에 해당하는 프로필 항목
  pub fn profile_entry(&self, now: DateTime<Utc>) -> Option<&VolumeProfileEntry> {
    let minute = minute_of_day(now);
    self.params.volume_profile.iter().find(|entry| entry.time == minute)
  }

  /// 중간값에서 스프레드 절반만큼 유리한 쪽으로 조정한 지정가
  pub fn limit_price(side: OrderSide, snapshot: &MarketSnapshot) -> f64 {
    let half_spread = snapshot.spread() / 2.0;
    match side {
      OrderSide::Buy => snapshot.mid() - half_spread,
      OrderSide::Sell => snapshot.mid() + half_spread,
    }
  }
}

impl SliceCalculator for VwapSplitter {
  fn interval(&self) -> Duration {
    self.interval
  }

  fn next_slice(
    &self,
    instance: &AlgorithmInstance,
    snapshot: Option<&MarketSnapshot>,
    now: DateTime<Utc>,
  ) -> Result<SliceDecision, TradingError> {
    let entry = match self.profile_entry(now) {
      Some(entry) => entry,
      None => return Ok(SliceDecision::Skip("no volume profile entry for this minute")),
    };

    let mut rate = entry.participation_rate;
    if let Some(max) = instance.parameters.max_participation_rate {
      rate = rate.min(max);
    }

    let target = (entry.expected_volume * rate / 100.0).floor().max(0.0) as u64;
    let quantity = cap_quantity(target, instance);
    if quantity == 0 {
      return Ok(SliceDecision::Skip("volume target rounds to zero"));
    }

    let snapshot = require_snapshot(instance, snapshot)?;
    let price = limit_price(Self::limit_price(instance.parameters.side, snapshot), instance);

    Ok(SliceDecision::Place(SlicePlan {
      quantity,
      order_type: OrderType::Limit,
      price: Some(price),
    }))
  }
}
