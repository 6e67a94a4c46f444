//! 알고리즘 생명주기/진행 이벤트 관찰자와 분배기

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::TradingError;
use crate::models::instance::{AlgorithmInstance, ExecutionResult, InstanceId};
use crate::models::order::Order;

/// 인스턴스 이벤트 관찰자. 필요한 메서드만 구현하면 된다.
pub trait AlgorithmObserver: Send + Sync {
  fn on_order_placed(&self, _instance: &AlgorithmInstance, _order: &Order) {}

  fn on_order_filled(&self, _instance: &AlgorithmInstance, _order: &Order) {}

  fn on_progress_update(&self, _instance: &AlgorithmInstance) {}

  fn on_error(&self, _instance: &AlgorithmInstance, _error: &TradingError) {}

  fn on_complete(&self, _result: &ExecutionResult) {}
}

/// 인스턴스별 관찰자 목록. 각 호출은 격리되어 패닉이 스케줄러로 번지지 않는다.
#[derive(Clone, Default)]
pub struct CallbackDispatcher {
  observers: Vec<Arc<dyn AlgorithmObserver>>,
}

impl CallbackDispatcher {
  pub fn new(observers: Vec<Arc<dyn AlgorithmObserver>>) -> Self {
    CallbackDispatcher { observers }
  }

  pub fn add(&mut self, observer: Arc<dyn AlgorithmObserver>) {
    self.observers.push(observer);
  }

  pub fn len(&self) -> usize {
    self.observers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.observers.is_empty()
  }

  pub fn order_placed(&self, instance: &AlgorithmInstance, order: &Order) {
    self.dispatch(&instance.id, "on_order_placed", |o| o.on_order_placed(instance, order));
  }

  pub fn order_filled(&self, instance: &AlgorithmInstance, order: &Order) {
    self.dispatch(&instance.id, "on_order_filled", |o| o.on_order_filled(instance, order));
  }

  pub fn progress_update(&self, instance: &AlgorithmInstance) {
    self.dispatch(&instance.id, "on_progress_update", |o| o.on_progress_update(instance));
  }

  pub fn error(&self, instance: &AlgorithmInstance, error: &TradingError) {
    self.dispatch(&instance.id, "on_error", |o| o.on_error(instance, error));
  }

  pub fn complete(&self, result: &ExecutionResult) {
    self.dispatch(&result.instance_id, "on_complete", |o| o.on_complete(result));
  }

  fn dispatch<F>(&self, id: &InstanceId, callback: &str, f: F)
  where
    F: Fn(&dyn AlgorithmObserver),
  {
    for observer in &self.observers {
      let result = catch_unwind(AssertUnwindSafe(|| f(observer.as_ref())));

      if let Err(e) = result {
        let msg = e
          .downcast_ref::<&str>()
          .map(|s| s.to_string())
          .or_else(|| e.downcast_ref::<String>().cloned())
          .unwrap_or_else(|| "Unknown panic".to_string());
        log::error!("{} 콜백 {} 패닉: {}", id, callback, msg);
      }
    }
  }
}

/// 브로드캐스트 채널로 내보내는 이벤트
#[derive(Debug, Clone, Serialize)]
pub enum AlgorithmEvent {
  OrderPlaced { instance_id: InstanceId, order: Order },
  OrderFilled { instance_id: InstanceId, order: Order },
  Progress { instance_id: InstanceId, executed_quantity: u64, remaining_quantity: u64, progress: f64 },
  Error { instance_id: InstanceId, message: String },
  Completed(ExecutionResult),
}

/// 이벤트를 tokio broadcast 채널로 전달하는 관찰자
pub struct EventBroadcaster {
  sender: broadcast::Sender<AlgorithmEvent>,
}

impl EventBroadcaster {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    EventBroadcaster { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AlgorithmEvent> {
    self.sender.subscribe()
  }

  fn send(&self, event: AlgorithmEvent) {
    // 구독자가 없으면 버린다
    let _ = self.sender.send(event);
  }
}

impl AlgorithmObserver for EventBroadcaster {
  fn on_order_placed(&self, instance: &AlgorithmInstance, order: &Order) {
    self.send(AlgorithmEvent::OrderPlaced { instance_id: instance.id.clone(), order: order.clone() });
  }

  fn on_order_filled(&self, instance: &AlgorithmInstance, order: &Order) {
    self.send(AlgorithmEvent::OrderFilled { instance_id: instance.id.clone(), order: order.clone() });
  }

  fn on_progress_update(&self, instance: &AlgorithmInstance) {
    self.send(AlgorithmEvent::Progress {
      instance_id: instance.id.clone(),
      executed_quantity: instance.executed_quantity,
      remaining_quantity: instance.remaining_quantity,
      progress: instance.current_progress,
    });
  }

  fn on_error(&self, instance: &AlgorithmInstance, error: &TradingError) {
    self.send(AlgorithmEvent::Error { instance_id: instance.id.clone(), message: error.to_string() });
  }

  fn on_complete(&self, result: &ExecutionResult) {
    self.send(AlgorithmEvent::Completed(result.clone()));
  }
}
