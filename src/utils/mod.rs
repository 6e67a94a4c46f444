//! 시간 관련 유틸리티
//!
//! 엔진 시계, 시간 변환 및 계산 함수 제공

pub mod logging;

use chrono::{DateTime, Timelike, Utc};
use tokio::time::Instant;

/// 엔진이 사용하는 현재 시각 공급자
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// 생성 시점의 벽시계를 기준으로 tokio 단조 시계만큼 진행하는 시계.
/// tokio 테스트의 일시정지 시계에서도 그대로 동작한다.
#[derive(Debug, Clone)]
pub struct EngineClock {
  anchor_wall: DateTime<Utc>,
  anchor_instant: Instant,
}

impl EngineClock {
  pub fn new() -> Self {
    EngineClock {
      anchor_wall: Utc::now(),
      anchor_instant: Instant::now(),
    }
  }
}

impl Default for EngineClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for EngineClock {
  fn now(&self) -> DateTime<Utc> {
    let elapsed = Instant::now().duration_since(self.anchor_instant);
    self.anchor_wall + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
  }
}

/// 자정 기준 경과 분 (UTC)
pub fn minute_of_day(dt: DateTime<Utc>) -> u32 {
  dt.hour() * 60 + dt.minute()
}

/// 두 시각 사이 간격 (초, 밀리초 정밀도)
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
  (end - start).num_milliseconds() as f64 / 1000.0
}
