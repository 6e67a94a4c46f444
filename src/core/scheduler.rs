/**
* filename : scheduler
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, EngineConfig};
use crate::core::callbacks::{AlgorithmEvent, AlgorithmObserver, CallbackDispatcher, EventBroadcaster};
use crate::core::execution_analyzer::{scorer_from_config, ExecutionScorer};
use crate::core::registry::{InstanceRegistry, RegistryStatistics};
use crate::core::{calculator_for, SliceCalculator, SliceDecision};
use crate::error::TradingError;
use crate::exchange::traits::OrderGateway;
use crate::market_data::{MarketDataCache, MarketDataFeed};
use crate::models::instance::{
  AlgorithmInstance, AlgorithmStatus, CompletionReason, ExecutionResult, InstanceId,
};
use crate::models::market_data::MarketSnapshot;
use crate::models::order::{Order, OrderRequest, OrderStatus, OrderType};
use crate::models::params::AlgorithmParameters;
use crate::utils::logging;
use crate::utils::Clock;

/// 틱 실행 후 타이머 루프 진행 여부
enum TickOutcome {
  Continue,
  Stop,
}

/// 인스턴스 잠금 안에서만 접근하는 가변 상태
struct InstanceState {
  instance: AlgorithmInstance,
  calculator: Box<dyn SliceCalculator>,
  dispatcher: CallbackDispatcher,
  /// 현재 대기 중인 타이머 토큰. 일시정지/종료 시 취소 후 제거
  timer: Option<CancellationToken>,
}

/// 인스턴스 하나의 소유 레코드
struct InstanceHandle {
  state: Mutex<InstanceState>,
  snapshot: watch::Sender<AlgorithmInstance>,
  result: OnceLock<ExecutionResult>,
}

impl InstanceHandle {
  fn publish(&self, instance: &AlgorithmInstance) {
    self.snapshot.send_replace(instance.clone());
  }
}

struct SchedulerInner {
  config: EngineConfig,
  gateway: Arc<dyn OrderGateway>,
  market_data: Arc<MarketDataCache>,
  clock: Arc<dyn Clock>,
  scorer: Arc<dyn ExecutionScorer>,
  registry: InstanceRegistry,
  handles: RwLock<HashMap<InstanceId, Arc<InstanceHandle>>>,
  events: Arc<EventBroadcaster>,
}

/// 알고리즘 스케줄러
///
/// 인스턴스마다 취소 가능한 타이머 태스크 하나를 돌리며, 틱 본문은 인스턴스
/// 잠금을 잡은 채 실행된다. 따라서 같은 인스턴스의 틱은 겹치지 않고,
/// 일시정지/재개/취소는 진행 중인 틱이 끝난 경계에서 반영된다.
/// 게이트웨이 호출은 모두 `tick_timeout` 으로 제한된다.
#[derive(Clone)]
pub struct AlgorithmScheduler {
  inner: Arc<SchedulerInner>,
}

impl AlgorithmScheduler {
  /// 설정의 산출 모델로 스케줄러 생성
  pub fn new(
    config: &Config,
    gateway: Arc<dyn OrderGateway>,
    market_data: Arc<MarketDataCache>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self::with_scorer(config.engine.clone(), gateway, market_data, clock, scorer_from_config(&config.metrics))
  }

  pub fn with_scorer(
    config: EngineConfig,
    gateway: Arc<dyn OrderGateway>,
    market_data: Arc<MarketDataCache>,
    clock: Arc<dyn Clock>,
    scorer: Arc<dyn ExecutionScorer>,
  ) -> Self {
    let events = Arc::new(EventBroadcaster::new(config.event_buffer));
    AlgorithmScheduler {
      inner: Arc::new(SchedulerInner {
        config,
        gateway,
        market_data,
        clock,
        scorer,
        registry: InstanceRegistry::new(),
        handles: RwLock::new(HashMap::new()),
        events,
      }),
    }
  }

  /// 파라미터 검증 후 인스턴스 생성 및 실행 시작
  pub async fn submit(
    &self,
    parameters: AlgorithmParameters,
    observers: Vec<Arc<dyn AlgorithmObserver>>,
  ) -> Result<InstanceId, TradingError> {
    let inner = &self.inner;
    let now = inner.clock.now();
    parameters.validate(now)?;

    let id = InstanceId::generate();
    let calculator = calculator_for(&parameters.kind, parameters.duration_secs(), &inner.config);
    let start_at = parameters.start_time;
    let instance = AlgorithmInstance::new(id.clone(), parameters, now);

    let mut dispatcher = CallbackDispatcher::new(observers);
    dispatcher.add(inner.events.clone());

    let (tx, rx) = watch::channel(instance.clone());
    let handle = Arc::new(InstanceHandle {
      state: Mutex::new(InstanceState { instance, calculator, dispatcher, timer: None }),
      snapshot: tx,
      result: OnceLock::new(),
    });

    inner.registry.register(id.clone(), rx);
    {
      let mut handles = inner.handles.write().unwrap_or_else(|e| e.into_inner());
      handles.insert(id.clone(), handle.clone());
    }

    let mut state = handle.state.lock().await;
    let now = inner.clock.now();
    state.instance.status = AlgorithmStatus::Running;
    state.instance.start_time = Some(now);
    state.instance.last_update_time = now;
    state.instance.arrival_snapshot = inner
      .market_data
      .latest_snapshot(&state.instance.parameters.symbol)
      .map(|s| (*s).clone());

    // 시작 시각이 미래면 그때까지 대기
    let until_start = (start_at - now).to_std().unwrap_or(Duration::ZERO);
    let first_delay = state.calculator.initial_delay().max(until_start);
    let interval = state.calculator.interval();

    let token = CancellationToken::new();
    state.timer = Some(token.clone());
    handle.publish(&state.instance);
    logging::log_algorithm_start(&state.instance);
    drop(state);

    inner.spawn_timer(handle, token, first_delay, interval);
    Ok(id)
  }

  /// 실행 중 인스턴스 일시정지. 체결/잔량은 그대로 유지
  pub async fn pause(&self, id: &InstanceId) -> Result<(), TradingError> {
    let handle = self.inner.handle(id)?;
    let mut state = handle.state.lock().await;

    if state.instance.status != AlgorithmStatus::Running {
      return Err(TradingError::InvalidState { id: id.clone(), operation: "pause", status: state.instance.status });
    }

    if let Some(token) = state.timer.take() {
      token.cancel();
    }
    state.instance.status = AlgorithmStatus::Paused;
    state.instance.last_update_time = self.inner.clock.now();
    handle.publish(&state.instance);

    log::info!("{} 일시정지 - 체결: {} - 잔량: {}", id, state.instance.executed_quantity, state.instance.remaining_quantity);
    Ok(())
  }

  /// 일시정지된 인스턴스 재개. 놓친 틱은 보충하지 않고 한 간격 뒤 다음 틱
  pub async fn resume(&self, id: &InstanceId) -> Result<(), TradingError> {
    let handle = self.inner.handle(id)?;
    let mut state = handle.state.lock().await;

    if state.instance.status != AlgorithmStatus::Paused {
      return Err(TradingError::InvalidState { id: id.clone(), operation: "resume", status: state.instance.status });
    }

    let token = CancellationToken::new();
    state.timer = Some(token.clone());
    state.instance.status = AlgorithmStatus::Running;
    state.instance.last_update_time = self.inner.clock.now();
    handle.publish(&state.instance);

    let interval = state.calculator.interval();
    log::info!("{} 재개", id);
    drop(state);

    self.inner.spawn_timer(handle, token, interval, interval);
    Ok(())
  }

  /// 종료되지 않은 인스턴스 취소. 미체결 하위 주문은 최선 노력으로 취소
  pub async fn cancel(&self, id: &InstanceId) -> Result<(), TradingError> {
    let handle = self.inner.handle(id)?;
    let mut state = handle.state.lock().await;

    if state.instance.is_terminal() {
      return Err(TradingError::InvalidState { id: id.clone(), operation: "cancel", status: state.instance.status });
    }

    self.inner.finish(&handle, &mut state, AlgorithmStatus::Cancelled, None, None).await;
    Ok(())
  }

  pub fn get_instance(&self, id: &InstanceId) -> Option<AlgorithmInstance> {
    self.inner.registry.get(id)
  }

  pub fn list_instances(&self) -> Vec<AlgorithmInstance> {
    self.inner.registry.list()
  }

  pub fn statistics(&self) -> RegistryStatistics {
    self.inner.registry.statistics()
  }

  /// 종료된 인스턴스를 레지스트리와 스케줄러에서 제거하고 제거된 id 반환.
  /// 실행 결과가 이미 만들어진 인스턴스만 대상이다
  pub fn prune_terminal(&self) -> Vec<InstanceId> {
    let mut handles = self.inner.handles.write().unwrap_or_else(|e| e.into_inner());
    let finished: Vec<InstanceId> = handles
      .iter()
      .filter(|(_, handle)| handle.result.get().is_some())
      .map(|(id, _)| id.clone())
      .collect();

    for id in &finished {
      handles.remove(id);
      self.inner.registry.remove(id);
    }

    if !finished.is_empty() {
      log::info!("종료된 인스턴스 {}개 정리", finished.len());
    }
    finished
  }

  /// 종료된 인스턴스의 실행 결과
  pub fn execution_result(&self, id: &InstanceId) -> Option<ExecutionResult> {
    self.inner.handle(id).ok().and_then(|h| h.result.get().cloned())
  }

  /// 외부 실시간 피드가 최신 스냅샷을 밀어 넣는다
  pub fn update_market_data(&self, symbol: &str, mut snapshot: MarketSnapshot) {
    snapshot.symbol = symbol.to_string();
    self.inner.market_data.update(snapshot);
  }

  /// 모든 인스턴스 이벤트 구독
  pub fn subscribe(&self) -> broadcast::Receiver<AlgorithmEvent> {
    self.inner.events.subscribe()
  }

  /// 인스턴스가 종료될 때까지 대기 후 실행 결과 반환
  pub async fn wait_for_completion(&self, id: &InstanceId) -> Result<ExecutionResult, TradingError> {
    let handle = self.inner.handle(id)?;
    let mut rx = handle.snapshot.subscribe();

    loop {
      if rx.borrow_and_update().status.is_terminal() {
        break;
      }
      if rx.changed().await.is_err() {
        break;
      }
    }

    handle
      .result
      .get()
      .cloned()
      .ok_or_else(|| TradingError::InstanceNotFound(id.clone()))
  }
}

impl SchedulerInner {
  fn handle(&self, id: &InstanceId) -> Result<Arc<InstanceHandle>, TradingError> {
    let handles = self.handles.read().unwrap_or_else(|e| e.into_inner());
    handles.get(id).cloned().ok_or_else(|| TradingError::InstanceNotFound(id.clone()))
  }

  fn spawn_timer(self: &Arc<Self>, handle: Arc<InstanceHandle>, token: CancellationToken, first_delay: Duration, interval: Duration) {
    let inner = self.clone();
    tokio::spawn(async move {
      // 틱 본문 시간과 무관하게 시작 시각 기준 간격 유지. 밀린 틱은 몰아서 실행하지 않음
      let mut ticker = interval_at(Instant::now() + first_delay, interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          _ = ticker.tick() => {}
        }

        if let TickOutcome::Stop = inner.run_tick(&handle, &token).await {
          break;
        }
      }
    });
  }

  /// 틱 하나 실행: 종료 조건 확인 -> 분할 계산 -> 주문 제출 -> 상태 갱신 -> 콜백
  async fn run_tick(&self, handle: &InstanceHandle, token: &CancellationToken) -> TickOutcome {
    let mut guard = handle.state.lock().await;
    let state = &mut *guard;

    // 잠금을 기다리는 동안 일시정지/취소되었으면 이 타이머는 끝
    if token.is_cancelled() || state.instance.status != AlgorithmStatus::Running {
      return TickOutcome::Stop;
    }

    let now = self.clock.now();
    if state.instance.remaining_quantity == 0 {
      self.finish(handle, state, AlgorithmStatus::Completed, Some(CompletionReason::QuantityFilled), None).await;
      return TickOutcome::Stop;
    }
    if now >= state.instance.parameters.end_time {
      self.finish(handle, state, AlgorithmStatus::Completed, Some(CompletionReason::EndTimeReached), None).await;
      return TickOutcome::Stop;
    }

    let snapshot = self.market_data.latest_snapshot(&state.instance.parameters.symbol);
    let decision = match state.calculator.next_slice(&state.instance, snapshot.as_deref(), now) {
      Ok(decision) => {
        state.instance.consecutive_data_failures = 0;
        decision
      }
      Err(e) if e.is_market_data() => {
        state.instance.consecutive_data_failures += 1;
        let failures = state.instance.consecutive_data_failures;
        if failures > self.config.max_market_data_failures {
          self.finish(handle, state, AlgorithmStatus::Error, None, Some(e)).await;
          return TickOutcome::Stop;
        }
        log::warn!("{} 시장 데이터 없음 ({}회 연속), 다음 틱에 재시도", state.instance.id, failures);
        handle.publish(&state.instance);
        return TickOutcome::Continue;
      }
      Err(e) => {
        self.finish(handle, state, AlgorithmStatus::Error, None, Some(e)).await;
        return TickOutcome::Stop;
      }
    };

    let plan = match decision {
      SliceDecision::Place(plan) => plan,
      SliceDecision::Skip(reason) => {
        log::debug!("{} 틱 건너뜀: {}", state.instance.id, reason);
        return TickOutcome::Continue;
      }
    };

    let params = &state.instance.parameters;
    let request = match plan.price {
      Some(price) if plan.order_type == OrderType::Limit => {
        OrderRequest::limit(params.symbol.as_str(), params.side, plan.quantity, price)
      }
      _ => OrderRequest::market(params.symbol.as_str(), params.side, plan.quantity),
    }
    .with_client_order_id(state.instance.next_client_order_id());

    let order = match self.submit_with_retry(request).await {
      Ok(order) => order,
      Err(e) => {
        if e.is_gateway() {
          log::warn!("{} 주문 게이트웨이 시도 {}회 모두 실패", state.instance.id, self.config.gateway_max_attempts.max(1));
        }
        self.finish(handle, state, AlgorithmStatus::Error, None, Some(e)).await;
        return TickOutcome::Stop;
      }
    };

    state.instance.record_order(order.clone(), self.clock.now());
    handle.publish(&state.instance);

    logging::log_slice(&state.instance, &order);
    state.dispatcher.order_placed(&state.instance, &order);
    if order.filled_quantity > 0 {
      state.dispatcher.order_filled(&state.instance, &order);
    }
    state.dispatcher.progress_update(&state.instance);

    if state.instance.remaining_quantity == 0 {
      self.finish(handle, state, AlgorithmStatus::Completed, Some(CompletionReason::QuantityFilled), None).await;
      return TickOutcome::Stop;
    }

    TickOutcome::Continue
  }

  /// 설정된 시도 횟수만큼 고정 간격으로 주문 생성 재시도
  async fn submit_with_retry(&self, request: OrderRequest) -> Result<Order, TradingError> {
    let attempts = self.config.gateway_max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
      let error = match timeout(self.config.tick_timeout(), self.gateway.create_order(request.clone())).await {
        Ok(Ok(order)) => return Ok(order),
        Ok(Err(e)) => e,
        Err(_) => TradingError::Timeout(
          self.config.tick_timeout_ms,
          format!("create_order {}", request.client_order_id),
        ),
      };

      log::warn!("주문 생성 실패 ({}/{}) {}: {}", attempt, attempts, request.client_order_id, error);
      last_error = Some(error);

      if attempt < attempts {
        tokio::time::sleep(self.config.retry_backoff()).await;
      }
    }

    Err(last_error.unwrap_or_else(|| TradingError::ExchangeError("order creation failed".to_string())))
  }

  /// 미체결 하위 주문 최선 노력 취소. 실패는 로그만 남긴다
  async fn cancel_open_orders(&self, instance: &mut AlgorithmInstance) {
    let open = instance.open_orders();
    if open.is_empty() {
      return;
    }

    let tick_timeout = self.config.tick_timeout();
    let results = join_all(open.into_iter().map(|order| async move {
      let result = match timeout(tick_timeout, self.gateway.cancel_order(&order.id)).await {
        Ok(result) => result,
        Err(_) => Err(TradingError::Timeout(self.config.tick_timeout_ms, format!("cancel_order {}", order.id))),
      };
      (order, result)
    }))
    .await;

    for (mut order, result) in results {
      match result {
        Ok(()) => {
          order.status = OrderStatus::Cancelled;
          instance.update_order_status(&order);
          logging::log_order_cancelled(&instance.id, &order.id);
        }
        Err(e) => logging::log_error(&format!("{} 하위 주문 {} 취소", instance.id, order.id), &e),
      }
    }
  }

  /// 종료 상태로 전이하고 실행 결과를 한 번만 만든다
  async fn finish(
    &self,
    handle: &InstanceHandle,
    state: &mut InstanceState,
    status: AlgorithmStatus,
    reason: Option<CompletionReason>,
    error: Option<TradingError>,
  ) {
    if let Some(token) = state.timer.take() {
      token.cancel();
    }

    let cancel_open = status != AlgorithmStatus::Completed || self.config.cancel_open_orders_on_complete;
    if cancel_open {
      self.cancel_open_orders(&mut state.instance).await;
    }

    let now = self.clock.now();
    let instance = &mut state.instance;
    instance.status = status;
    instance.end_time = Some(now);
    instance.last_update_time = now;
    instance.completion_reason = reason;
    instance.error = error.as_ref().map(|e| e.to_string());

    let final_snapshot = self.market_data.latest_snapshot(&instance.parameters.symbol);
    let costs = self.scorer.score(instance, final_snapshot.as_deref());
    let result = ExecutionResult::new(instance, costs);
    if handle.result.set(result.clone()).is_err() {
      log::warn!("{} 실행 결과가 이미 존재함", instance.id);
    }
    handle.publish(instance);

    if let Some(e) = &error {
      logging::log_error(&format!("{} 실행 중단", state.instance.id), e);
      state.dispatcher.error(&state.instance, e);
    }
    state.dispatcher.complete(&result);
    logging::log_algorithm_end(&result);
  }
}
