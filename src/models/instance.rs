use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::market_data::MarketSnapshot;
use crate::models::order::Order;
use crate::models::params::{AlgorithmKind, AlgorithmParameters};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn generate() -> Self {
        InstanceId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlgorithmType {
    Twap,
    Vwap,
    Pov,
}

impl AlgorithmType {
    pub fn of(kind: &AlgorithmKind) -> Self {
        match kind {
            AlgorithmKind::Twap(_) => AlgorithmType::Twap,
            AlgorithmKind::Vwap(_) => AlgorithmType::Vwap,
            AlgorithmKind::Pov(_) => AlgorithmType::Pov,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Twap => "twap",
            AlgorithmType::Vwap => "vwap",
            AlgorithmType::Pov => "pov",
        }
    }
}

/// 알고리즘 인스턴스 생명주기 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlgorithmStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl AlgorithmStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AlgorithmStatus::Completed | AlgorithmStatus::Cancelled | AlgorithmStatus::Error
        )
    }
}

/// 완료 사유
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionReason {
    QuantityFilled,
    EndTimeReached,
}

/// 실행 중인 알고리즘 하나의 상태 기록. 스케줄러만 수정한다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmInstance {
    pub id: InstanceId,
    pub algorithm: AlgorithmType,
    pub parameters: AlgorithmParameters,
    pub status: AlgorithmStatus,
    pub created_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_update_time: DateTime<Utc>,
    pub current_progress: f64,
    pub executed_quantity: u64,
    pub remaining_quantity: u64,
    pub average_execution_price: f64,
    pub orders: Vec<Order>,
    pub error: Option<String>,
    pub completion_reason: Option<CompletionReason>,
    pub consecutive_data_failures: u32,
    pub arrival_snapshot: Option<MarketSnapshot>,
    pub slices_planned: Option<u32>,
}

impl AlgorithmInstance {
    pub fn new(id: InstanceId, parameters: AlgorithmParameters, now: DateTime<Utc>) -> Self {
        let slices_planned = match &parameters.kind {
            AlgorithmKind::Twap(twap) => Some(twap.slice_count),
            AlgorithmKind::Vwap(vwap) => Some(vwap.volume_profile.len() as u32),
            AlgorithmKind::Pov(_) => None,
        };

        AlgorithmInstance {
            id,
            algorithm: AlgorithmType::of(&parameters.kind),
            remaining_quantity: parameters.total_quantity,
            parameters,
            status: AlgorithmStatus::Pending,
            created_time: now,
            start_time: None,
            end_time: None,
            last_update_time: now,
            current_progress: 0.0,
            executed_quantity: 0,
            average_execution_price: 0.0,
            orders: Vec::new(),
            error: None,
            completion_reason: None,
            consecutive_data_failures: 0,
            arrival_snapshot: None,
            slices_planned,
        }
    }

    pub fn total_quantity(&self) -> u64 {
        self.parameters.total_quantity
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 새 하위 주문 기록 및 체결 수량/평균가 갱신
    pub fn record_order(&mut self, order: Order, now: DateTime<Utc>) {
        let filled = order.filled_quantity.min(self.remaining_quantity);
        if filled > 0 {
            let prior_value = self.average_execution_price * self.executed_quantity as f64;
            self.executed_quantity += filled;
            self.remaining_quantity -= filled;
            self.average_execution_price =
                (prior_value + order.average_fill_price * filled as f64) / self.executed_quantity as f64;
        }

        self.current_progress = self.executed_quantity as f64 / self.total_quantity() as f64;
        self.orders.push(order);
        self.last_update_time = now;
    }

    /// 하위 주문 상태 갱신 (목록에서 제거하지 않음)
    pub fn update_order_status(&mut self, updated: &Order) {
        if let Some(order) = self.orders.iter_mut().find(|o| o.id == updated.id) {
            order.status = updated.status;
        }
    }

    /// 아직 살아있는 하위 주문
    pub fn open_orders(&self) -> Vec<Order> {
        self.orders.iter().filter(|o| o.status.is_open()).cloned().collect()
    }

    /// 살아있는 하위 주문에 남아 있는 미체결 수량
    pub fn open_quantity(&self) -> u64 {
        self.orders
            .iter()
            .filter(|o| o.status.is_open())
            .map(|o| o.quantity.saturating_sub(o.filled_quantity))
            .sum()
    }

    /// 새 분할에 쓸 수 있는 수량 (잔량 - 미체결 대기 수량)
    pub fn available_quantity(&self) -> u64 {
        self.remaining_quantity.saturating_sub(self.open_quantity())
    }

    /// 다음 하위 주문 client id
    pub fn next_client_order_id(&self) -> String {
        format!("{}-{}-{}", self.algorithm.as_str(), self.id, self.orders.len() + 1)
    }
}

/// 실행 비용 지표
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionCosts {
    pub slippage: f64,
    pub timing_cost: f64,
    pub market_impact: f64,
}

/// 간단한 성과 요약
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub duration_secs: f64,
    pub child_orders: usize,
    pub filled_orders: usize,
    pub fill_ratio: f64,
    pub average_slice: f64,
}

/// 종료 시점에 한 번만 만들어지는 실행 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub instance_id: InstanceId,
    pub status: AlgorithmStatus,
    pub completion_reason: Option<CompletionReason>,
    pub executed_quantity: u64,
    pub remaining_quantity: u64,
    pub average_price: f64,
    pub slippage: f64,
    pub timing_cost: f64,
    pub market_impact: f64,
    pub orders: Vec<Order>,
    pub error: Option<String>,
    pub performance: PerformanceMetrics,
}

impl ExecutionResult {
    pub fn new(instance: &AlgorithmInstance, costs: ExecutionCosts) -> Self {
        let started = instance.start_time.unwrap_or(instance.created_time);
        let ended = instance.end_time.unwrap_or(instance.last_update_time);
        let child_orders = instance.orders.len();
        let filled_orders = instance.orders.iter().filter(|o| o.filled_quantity > 0).count();

        let performance = PerformanceMetrics {
            duration_secs: (ended - started).num_milliseconds().max(0) as f64 / 1000.0,
            child_orders,
            filled_orders,
            fill_ratio: instance.current_progress,
            average_slice: if filled_orders > 0 {
                instance.executed_quantity as f64 / filled_orders as f64
            } else {
                0.0
            },
        };

        ExecutionResult {
            instance_id: instance.id.clone(),
            status: instance.status,
            completion_reason: instance.completion_reason,
            executed_quantity: instance.executed_quantity,
            remaining_quantity: instance.remaining_quantity,
            average_price: instance.average_execution_price,
            slippage: costs.slippage,
            timing_cost: costs.timing_cost,
            market_impact: costs.market_impact,
            orders: instance.orders.clone(),
            error: instance.error.clone(),
            performance,
        }
    }
}
