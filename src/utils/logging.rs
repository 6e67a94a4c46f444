//! 로깅 유틸리티
//!
//! 로그 초기화 및 유틸리티 함수 제공

use env_logger::Builder;
use log::LevelFilter;
use std::env;

use crate::config::LoggingConfig;
use crate::error::TradingError;
use crate::models::instance::{AlgorithmInstance, ExecutionResult, InstanceId};
use crate::models::order::{Order, OrderId};

/// 로깅 시스템 초기화. RUST_LOG 가 설정되어 있으면 설정 파일보다 우선한다.
pub fn init(config: &LoggingConfig) -> Result<(), TradingError> {
  let mut builder = Builder::from_default_env();

  let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());

  let level_filter = match log_level.to_lowercase().as_str() {
    "trace" => LevelFilter::Trace,
    "debug" => LevelFilter::Debug,
    "info" => LevelFilter::Info,
    "warn" => LevelFilter::Warn,
    "error" => LevelFilter::Error,
    _ => LevelFilter::Info,
  };

  builder
    .filter_level(level_filter)
    .format_timestamp_millis()
    .try_init()
    .map_err(|e| TradingError::ConfigError(format!("Failed to initialise logger: {}", e)))?;

  log::info!("로깅 시스템 초기화 완료: 레벨 = {}", log_level);

  Ok(())
}

/// 알고리즘 시작 로그
pub fn log_algorithm_start(instance: &AlgorithmInstance) {
  log::info!(
    "알고리즘 시작: {} [{}] - 심볼: {} - 방향: {} - 수량: {}",
    instance.id,
    instance.algorithm.as_str(),
    instance.parameters.symbol,
    instance.parameters.side,
    instance.total_quantity()
  );
}

/// 알고리즘 종료 로그
pub fn log_algorithm_end(result: &ExecutionResult) {
  log::info!(
    "알고리즘 종료: {} - 상태: {:?} - 체결: {} - 잔량: {} - 평균가: {:.4}",
    result.instance_id,
    result.status,
    result.executed_quantity,
    result.remaining_quantity,
    result.average_price
  );
}

/// 하위 주문 생성 로그
pub fn log_slice(instance: &AlgorithmInstance, order: &Order) {
  log::info!(
    "하위 주문: {} - 주문: {} - {:?} - 수량: {} - 가격: {:?} - 체결: {}",
    instance.id,
    order.id,
    order.order_type,
    order.quantity,
    order.price,
    order.filled_quantity
  );
}

/// 하위 주문 취소 로그
pub fn log_order_cancelled(instance_id: &InstanceId, order_id: &OrderId) {
  log::info!("하위 주문 취소: {} - 주문: {}", instance_id, order_id);
}

/// 오류 로그
pub fn log_error(context: &str, error: &TradingError) {
  log::error!("오류 발생 - {}: {}", context, error);
}
