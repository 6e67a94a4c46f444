/**
* filename : execution_analyzer
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use std::sync::Arc;

use crate::config::{MetricsConfig, MetricsModel};
use crate::models::instance::{AlgorithmInstance, ExecutionCosts};
use crate::models::market_data::MarketSnapshot;

/// 종료 시점 실행 비용 산출 인터페이스
pub trait ExecutionScorer: Send + Sync {
  /// 종료된 인스턴스와 종료 시점 스냅샷으로 비용 계산
  fn score(&self, instance: &AlgorithmInstance, final_snapshot: Option<&MarketSnapshot>) -> ExecutionCosts;
}

/// 설정된 고정 값을 그대로 돌려주는 산출기
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRateScorer {
  pub slippage: f64,
  pub timing_cost: f64,
  pub market_impact: f64,
}

impl ExecutionScorer for FixedRateScorer {
  fn score(&self, _instance: &AlgorithmInstance, _final_snapshot: Option<&MarketSnapshot>) -> ExecutionCosts {
    ExecutionCosts {
      slippage: self.slippage,
      timing_cost: self.timing_cost,
      market_impact: self.market_impact,
    }
  }
}

/// 도착 가격(arrival price) 대비 비용 산출기. 모든 값은 % 단위이며
/// 양수는 주문 방향에 불리한 비용이다.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalPriceScorer;

impl ArrivalPriceScorer {
  /// 체결가의 도착 가격 대비 슬리피지 (수량 가중)
  fn slippage(instance: &AlgorithmInstance, arrival: f64) -> f64 {
    let direction = instance.parameters.side.sign();
    let mut total_slippage = 0.0;
    let mut total_volume = 0.0;

    for order in instance.orders.iter().filter(|o| o.filled_quantity > 0) {
      let slippage = direction * (order.average_fill_price - arrival) / arrival * 100.0;
      total_slippage += slippage * order.filled_quantity as f64;
      total_volume += order.filled_quantity as f64;
    }

    if total_volume > 0.0 {
      total_slippage / total_volume
    } else {
      0.0
    }
  }
}

impl ExecutionScorer for ArrivalPriceScorer {
  fn score(&self, instance: &AlgorithmInstance, final_snapshot: Option<&MarketSnapshot>) -> ExecutionCosts {
    let arrival = match instance.arrival_snapshot.as_ref().map(|s| s.mid()) {
      Some(price) if price > 0.0 => price,
      _ => return ExecutionCosts::default(),
    };

    let slippage = Self::slippage(instance, arrival);

    // 주문 방향으로 가격이 움직였으면 양수
    let market_impact = match final_snapshot {
      Some(snapshot) if snapshot.mid() > 0.0 => {
        instance.parameters.side.sign() * (snapshot.mid() - arrival) / arrival * 100.0
      }
      _ => 0.0,
    };

    // 미체결 비율만큼 가격 이동 비용을 부담한 것으로 본다
    let unfilled = instance.remaining_quantity as f64 / instance.total_quantity() as f64;
    let timing_cost = unfilled * market_impact;

    ExecutionCosts {
      slippage,
      timing_cost,
      market_impact,
    }
  }
}

/// 설정에 맞는 산출기 생성
pub fn scorer_from_config(config: &MetricsConfig) -> Arc<dyn ExecutionScorer> {
  match config.model {
    MetricsModel::Fixed => Arc::new(FixedRateScorer {
      slippage: config.fixed_slippage,
      timing_cost: config.fixed_timing_cost,
      market_impact: config.fixed_market_impact,
    }),
    MetricsModel::Arrival => Arc::new(ArrivalPriceScorer),
  }
}
