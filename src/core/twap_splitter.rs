/**
* filename : twap_splitter
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::{cap_quantity, SliceCalculator, SliceDecision, SlicePlan};
use crate::error::TradingError;
use crate::models::instance::AlgorithmInstance;
use crate::models::market_data::MarketSnapshot;
use crate::models::order::OrderType;
use crate::models::params::TwapParameters;
use crate::utils::seconds_between;

/// TWAP 기반 주문 분할기
///
/// 매 틱마다 남은 시간으로 남은 분할 수를 다시 계산하므로, 앞선 분할이
/// 덜 체결되거나 더 체결되어도 이후 분할이 차이를 흡수한다.
pub struct TwapSplitter {
  /// TWAP 파라미터
  params: TwapParameters,
  /// 틱 간격 (초)
  interval_secs: u64,
}

impl TwapSplitter {
  /// 새 TWAP 분할기 생성
  pub fn new(params: TwapParameters, duration_secs: f64) -> Self {
    let interval_secs = match params.interval_seconds {
      Some(secs) => secs,
      None => (duration_secs / params.slice_count.max(1) as f64).ceil().max(1.0) as u64,
    };

    TwapSplitter { params, interval_secs }
  }

  /// 종료 시각까지 남은 분할 수
  fn remaining_slices(&self, instance: &AlgorithmInstance, now: DateTime<Utc>) -> i64 {
    let secs_left = seconds_between(now, instance.parameters.end_time);
    (secs_left / self.interval_secs as f64).ceil() as i64
  }
}

impl SliceCalculator for TwapSplitter {
  fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs)
  }

  fn next_slice(
    &self,
    instance: &AlgorithmInstance,
    _snapshot: Option<&MarketSnapshot>,
    now: DateTime<Utc>,
  ) -> Result<SliceDecision, TradingError> {
    if instance.remaining_quantity == 0 {
      return Ok(SliceDecision::Skip("nothing remaining"));
    }

    // 대기 중인 하위 주문 수량은 이미 약속된 것으로 본다
    let available = instance.available_quantity();
    if available == 0 {
      return Ok(SliceDecision::Skip("remaining quantity is resting"));
    }

    let remaining_slices = self.remaining_slices(instance, now);

    let quantity = if remaining_slices <= 1 {
      // 마지막 분할: 잔량 전체. allow_overshoot 면 max_order_size 무시
      match instance.parameters.max_order_size {
        Some(max) if !self.params.allow_overshoot => available.min(max),
        _ => available,
      }
    } else {
      let mut slice = available / remaining_slices as u64;
      if let Some(min) = instance.parameters.min_order_size {
        slice = slice.max(min);
      }
      cap_quantity(slice, instance)
    };

    if quantity == 0 {
      return Ok(SliceDecision::Skip("slice rounds to zero"));
    }

    Ok(SliceDecision::Place(SlicePlan {
      quantity,
      order_type: OrderType::Market,
      price: None,
    }))
  }
}
