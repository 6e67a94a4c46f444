//! 인스턴스 id -> 읽기 전용 스냅샷 인덱스

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;

use crate::models::instance::{AlgorithmInstance, AlgorithmStatus, InstanceId};

/// 상태별 인스턴스 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStatistics {
  pub total: usize,
  pub pending: usize,
  pub running: usize,
  pub paused: usize,
  pub completed: usize,
  pub cancelled: usize,
  pub error: usize,
}

/// 프로세스 전역 인스턴스 색인.
///
/// 스케줄러가 발행하는 `watch` 수신자만 보관하므로 인스턴스를 수정할 수 없다.
/// 맵 자체의 삽입/조회만 락으로 보호한다.
#[derive(Default)]
pub struct InstanceRegistry {
  instances: RwLock<HashMap<InstanceId, watch::Receiver<AlgorithmInstance>>>,
}

impl InstanceRegistry {
  pub fn new() -> Self {
    InstanceRegistry {
      instances: RwLock::new(HashMap::new()),
    }
  }

  pub fn register(&self, id: InstanceId, snapshot: watch::Receiver<AlgorithmInstance>) {
    let mut guard = self.instances.write().unwrap_or_else(|e| e.into_inner());
    guard.insert(id, snapshot);
  }

  /// 색인에서 제거. 제거된 경우 true
  pub fn remove(&self, id: &InstanceId) -> bool {
    let mut guard = self.instances.write().unwrap_or_else(|e| e.into_inner());
    guard.remove(id).is_some()
  }

  pub fn contains(&self, id: &InstanceId) -> bool {
    let guard = self.instances.read().unwrap_or_else(|e| e.into_inner());
    guard.contains_key(id)
  }

  /// 최신 스냅샷 복사본
  pub fn get(&self, id: &InstanceId) -> Option<AlgorithmInstance> {
    let guard = self.instances.read().unwrap_or_else(|e| e.into_inner());
    guard.get(id).map(|rx| rx.borrow().clone())
  }

  /// 생성 시각 순 전체 스냅샷
  pub fn list(&self) -> Vec<AlgorithmInstance> {
    let mut all: Vec<AlgorithmInstance> = {
      let guard = self.instances.read().unwrap_or_else(|e| e.into_inner());
      guard.values().map(|rx| rx.borrow().clone()).collect()
    };
    all.sort_by_key(|inst| inst.created_time);
    all
  }

  pub fn len(&self) -> usize {
    let guard = self.instances.read().unwrap_or_else(|e| e.into_inner());
    guard.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn statistics(&self) -> RegistryStatistics {
    let guard = self.instances.read().unwrap_or_else(|e| e.into_inner());
    let mut stats = RegistryStatistics { total: guard.len(), ..RegistryStatistics::default() };

    for rx in guard.values() {
      match rx.borrow().status {
        AlgorithmStatus::Pending => stats.pending += 1,
        AlgorithmStatus::Running => stats.running += 1,
        AlgorithmStatus::Paused => stats.paused += 1,
        AlgorithmStatus::Completed => stats.completed += 1,
        AlgorithmStatus::Cancelled => stats.cancelled += 1,
        AlgorithmStatus::Error => stats.error += 1,
      }
    }

    stats
  }
}
