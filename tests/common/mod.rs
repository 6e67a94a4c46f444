//! 통합 테스트 공용 픽스처

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use xAlgo::config::{Config, SimulationConfig};
use xAlgo::exchange::mocks::MockGateway;
use xAlgo::utils::{Clock, EngineClock};
use xAlgo::{
  AlgorithmInstance, AlgorithmKind, AlgorithmObserver, AlgorithmParameters, AlgorithmScheduler, ExecutionResult,
  MarketDataCache, MarketSnapshot, Order, OrderSide, TradingError, TwapParameters,
};

pub const SYMBOL: &str = "BTCUSDT";

pub struct Engine {
  pub scheduler: AlgorithmScheduler,
  pub gateway: Arc<MockGateway>,
  pub market_data: Arc<MarketDataCache>,
  pub clock: Arc<dyn Clock>,
}

pub fn snapshot(volume: f64) -> MarketSnapshot {
  MarketSnapshot::new(SYMBOL, 100.0, 99.0, 101.0, volume, Utc::now())
}

pub fn engine_with(config: Config) -> Engine {
  let clock: Arc<dyn Clock> = Arc::new(EngineClock::new());
  let market_data = Arc::new(MarketDataCache::new());
  market_data.update(snapshot(2000.0));

  let gateway = Arc::new(MockGateway::new(config.simulation.clone(), market_data.clone(), clock.clone()));
  let scheduler = AlgorithmScheduler::new(&config, gateway.clone(), market_data.clone(), clock.clone());

  Engine { scheduler, gateway, market_data, clock }
}

pub fn engine() -> Engine {
  engine_with(Config::default())
}

pub fn engine_with_simulation(simulation: SimulationConfig) -> Engine {
  engine_with(Config { simulation, ..Config::default() })
}

/// 100 수량, 10초 간격, 100초 TWAP
pub fn twap(clock: &Arc<dyn Clock>, total: u64) -> AlgorithmParameters {
  let now = clock.now();
  AlgorithmParameters::new(
    SYMBOL,
    OrderSide::Buy,
    total,
    now,
    now + Duration::seconds(100),
    AlgorithmKind::Twap(TwapParameters { interval_seconds: Some(10), slice_count: 10, allow_overshoot: false }),
  )
}

/// 콜백 호출을 순서대로 기록하는 관찰자
#[derive(Default)]
pub struct Recorder {
  pub events: Mutex<Vec<String>>,
  pub progress: Mutex<Vec<f64>>,
  pub results: Mutex<Vec<ExecutionResult>>,
}

impl Recorder {
  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  pub fn count(&self, name: &str) -> usize {
    self.events().iter().filter(|e| e.as_str() == name).count()
  }
}

impl AlgorithmObserver for Recorder {
  fn on_order_placed(&self, _instance: &AlgorithmInstance, _order: &Order) {
    self.events.lock().unwrap().push("placed".to_string());
  }

  fn on_order_filled(&self, _instance: &AlgorithmInstance, _order: &Order) {
    self.events.lock().unwrap().push("filled".to_string());
  }

  fn on_progress_update(&self, instance: &AlgorithmInstance) {
    self.events.lock().unwrap().push("progress".to_string());
    self.progress.lock().unwrap().push(instance.current_progress);
  }

  fn on_error(&self, _instance: &AlgorithmInstance, _error: &TradingError) {
    self.events.lock().unwrap().push("error".to_string());
  }

  fn on_complete(&self, result: &ExecutionResult) {
    self.events.lock().unwrap().push("complete".to_string());
    self.results.lock().unwrap().push(result.clone());
  }
}
