//! 게이트웨이/시장 데이터 실패와 콜백 격리 테스트

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;

use common::{engine, engine_with, snapshot, twap, Recorder, SYMBOL};
use xAlgo::config::{Config, EngineConfig, SimulationConfig};
use xAlgo::utils::{Clock, EngineClock};
use xAlgo::{
  AlgorithmInstance, AlgorithmKind, AlgorithmObserver, AlgorithmParameters, AlgorithmScheduler, AlgorithmStatus,
  MarketDataCache, Order, OrderGateway, OrderId, OrderRequest, OrderSide, OrderStatus, PovParameters, TradingError,
};

mock! {
  pub ScriptedGateway {}

  #[async_trait]
  impl OrderGateway for ScriptedGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, TradingError>;
    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), TradingError>;
  }
}

fn order_for(request: &OrderRequest, fill: bool) -> Order {
  let mut order = Order::from_request(OrderId(format!("scripted-{}", request.client_order_id)), request, Utc::now());
  if fill {
    order.apply_fill(request.quantity, 100.0);
  }
  order
}

fn scheduler_with(gateway: MockScriptedGateway, engine_config: EngineConfig) -> (AlgorithmScheduler, Arc<dyn Clock>) {
  let clock: Arc<dyn Clock> = Arc::new(EngineClock::new());
  let market_data = Arc::new(MarketDataCache::new());
  market_data.update(snapshot(2000.0));
  let config = Config { engine: engine_config, ..Config::default() };
  (AlgorithmScheduler::new(&config, Arc::new(gateway), market_data, clock.clone()), clock)
}

fn pov(clock: &Arc<dyn Clock>) -> AlgorithmParameters {
  let now = clock.now();
  AlgorithmParameters::new(
    SYMBOL,
    OrderSide::Buy,
    1000,
    now,
    now + chrono::Duration::minutes(30),
    AlgorithmKind::Pov(PovParameters {
      target_participation_rate: 10.0,
      min_participation_rate: 5.0,
      max_participation_rate: 25.0,
      adjustment_factor: 1.0,
    }),
  )
}

#[tokio::test(start_paused = true)]
async fn test_gateway_rejection_moves_to_error() {
  let mut gateway = MockScriptedGateway::new();
  gateway
    .expect_create_order()
    .times(1)
    .returning(|_| Err(TradingError::ExchangeError("insufficient balance".to_string())));
  gateway.expect_cancel_order().never();

  let (scheduler, clock) = scheduler_with(gateway, EngineConfig::default());
  let recorder = Arc::new(Recorder::default());
  let id = scheduler.submit(twap(&clock, 100), vec![recorder.clone()]).await.unwrap();

  let result = scheduler.wait_for_completion(&id).await.unwrap();

  assert_eq!(result.status, AlgorithmStatus::Error);
  assert!(result.error.as_deref().unwrap_or_default().contains("insufficient balance"));
  assert_eq!(result.executed_quantity, 0);
  assert_eq!(recorder.events(), vec!["error".to_string(), "complete".to_string()]);

  // 오류 뒤에는 더 이상 틱이 없다
  tokio::time::sleep(Duration::from_secs(60)).await;
  assert_eq!(scheduler.get_instance(&id).unwrap().orders.len(), 0);
  assert_eq!(scheduler.statistics().error, 1);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_retry_recovers() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();

  let mut gateway = MockScriptedGateway::new();
  gateway.expect_create_order().returning(move |request| {
    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
      Err(TradingError::ExchangeError("busy".to_string()))
    } else {
      Ok(order_for(&request, true))
    }
  });

  let engine_config = EngineConfig { gateway_max_attempts: 3, ..EngineConfig::default() };
  let (scheduler, clock) = scheduler_with(gateway, engine_config);
  let id = scheduler.submit(twap(&clock, 100), vec![]).await.unwrap();

  let result = scheduler.wait_for_completion(&id).await.unwrap();

  assert_eq!(result.status, AlgorithmStatus::Completed);
  assert_eq!(result.executed_quantity, 100);
  assert_eq!(result.orders.len(), 10);
  assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_retry_exhausted() {
  let mut gateway = MockScriptedGateway::new();
  gateway
    .expect_create_order()
    .times(2)
    .returning(|_| Err(TradingError::ExchangeError("busy".to_string())));

  let engine_config = EngineConfig { gateway_max_attempts: 2, ..EngineConfig::default() };
  let (scheduler, clock) = scheduler_with(gateway, engine_config);
  let id = scheduler.submit(twap(&clock, 100), vec![]).await.unwrap();

  let result = scheduler.wait_for_completion(&id).await.unwrap();
  assert_eq!(result.status, AlgorithmStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_slow_gateway_times_out() {
  let config = Config {
    engine: EngineConfig { tick_timeout_ms: 1000, ..EngineConfig::default() },
    simulation: SimulationConfig { latency_ms: 10_000, ..SimulationConfig::default() },
    ..Config::default()
  };
  let engine = engine_with(config);
  let id = engine.scheduler.submit(twap(&engine.clock, 100), vec![]).await.unwrap();

  let result = engine.scheduler.wait_for_completion(&id).await.unwrap();

  assert_eq!(result.status, AlgorithmStatus::Error);
  assert!(result.error.as_deref().unwrap_or_default().contains("Timed out"));
  assert!(result.orders.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_market_data_is_tolerated_then_fails() {
  let engine = engine();
  engine.market_data.remove(SYMBOL);
  let id = engine.scheduler.submit(pov(&engine.clock), vec![]).await.unwrap();

  // 30, 60, 90초 실패는 허용
  tokio::time::sleep(Duration::from_secs(100)).await;
  let inst = engine.scheduler.get_instance(&id).unwrap();
  assert_eq!(inst.status, AlgorithmStatus::Running);
  assert_eq!(inst.consecutive_data_failures, 3);

  let result = engine.scheduler.wait_for_completion(&id).await.unwrap();
  assert_eq!(result.status, AlgorithmStatus::Error);
  assert!(result.error.as_deref().unwrap_or_default().contains("Market data unavailable"));
  assert!((result.performance.duration_secs - 120.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_market_data_recovery_resets_failures() {
  let engine = engine();
  engine.market_data.remove(SYMBOL);
  let id = engine.scheduler.submit(pov(&engine.clock), vec![]).await.unwrap();

  tokio::time::sleep(Duration::from_secs(65)).await;
  assert_eq!(engine.scheduler.get_instance(&id).unwrap().consecutive_data_failures, 2);

  engine.scheduler.update_market_data(SYMBOL, snapshot(2000.0));
  tokio::time::sleep(Duration::from_secs(30)).await;

  let inst = engine.scheduler.get_instance(&id).unwrap();
  assert_eq!(inst.status, AlgorithmStatus::Running);
  assert_eq!(inst.consecutive_data_failures, 0);
  assert_eq!(inst.orders.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_cancels_resting_child_orders() {
  let mut gateway = MockScriptedGateway::new();
  gateway.expect_create_order().returning(|request| Ok(order_for(&request, false)));
  gateway.expect_cancel_order().times(3).returning(|_| Ok(()));

  let (scheduler, clock) = scheduler_with(gateway, EngineConfig::default());
  let id = scheduler.submit(twap(&clock, 100), vec![]).await.unwrap();

  tokio::time::sleep(Duration::from_secs(25)).await;
  scheduler.cancel(&id).await.unwrap();

  let result = scheduler.execution_result(&id).unwrap();
  assert_eq!(result.status, AlgorithmStatus::Cancelled);
  assert_eq!(result.orders.len(), 3);
  assert!(result.orders.iter().all(|o| o.status == OrderStatus::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_failed_child_cancel_is_only_logged() {
  let mut gateway = MockScriptedGateway::new();
  gateway.expect_create_order().returning(|request| Ok(order_for(&request, false)));
  gateway
    .expect_cancel_order()
    .returning(|order_id| Err(TradingError::OrderNotFound(order_id.clone())));

  let (scheduler, clock) = scheduler_with(gateway, EngineConfig::default());
  let id = scheduler.submit(twap(&clock, 100), vec![]).await.unwrap();

  tokio::time::sleep(Duration::from_secs(5)).await;
  scheduler.cancel(&id).await.unwrap();

  let inst = scheduler.get_instance(&id).unwrap();
  assert_eq!(inst.status, AlgorithmStatus::Cancelled);
  assert_eq!(inst.orders[0].status, OrderStatus::New);
}

struct PanickingObserver;

impl AlgorithmObserver for PanickingObserver {
  fn on_order_placed(&self, _instance: &AlgorithmInstance, _order: &Order) {
    panic!("observer bug");
  }

  fn on_complete(&self, _result: &xAlgo::ExecutionResult) {
    panic!("observer bug on completion");
  }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_callback_does_not_stop_execution() {
  let engine = engine();
  let recorder = Arc::new(Recorder::default());
  let id = engine
    .scheduler
    .submit(twap(&engine.clock, 100), vec![Arc::new(PanickingObserver), recorder.clone()])
    .await
    .unwrap();

  let result = engine.scheduler.wait_for_completion(&id).await.unwrap();

  assert_eq!(result.status, AlgorithmStatus::Completed);
  assert_eq!(result.executed_quantity, 100);
  assert_eq!(recorder.count("placed"), 10);
  assert_eq!(recorder.count("complete"), 1);
}
