use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 매수 +1, 매도 -1
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// 거래소에 아직 살아있는 주문인지 여부
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// Child order request handed to an `OrderGateway`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: u64,
    pub price: Option<f64>,
    pub client_order_id: String,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: u64) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            client_order_id: String::new(),
        }
    }

    pub fn limit(symbol: impl Into<String>, side: OrderSide, quantity: u64, price: f64) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            client_order_id: String::new(),
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = client_order_id.into();
        self
    }
}

/// A child order as reported back by the gateway. The gateway owns the live
/// order; algorithm instances keep copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: u64,
    pub price: Option<f64>,
    pub status: OrderStatus,
    pub filled_quantity: u64,
    pub average_fill_price: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// 요청으로부터 미체결(New) 주문 생성
    pub fn from_request(id: OrderId, request: &OrderRequest, created_at: DateTime<Utc>) -> Self {
        Order {
            id,
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            status: OrderStatus::New,
            filled_quantity: 0,
            average_fill_price: 0.0,
            created_at,
        }
    }

    /// 체결 반영 (누적 수량 기준 가중 평균가 갱신)
    pub fn apply_fill(&mut self, quantity: u64, price: f64) {
        let quantity = quantity.min(self.quantity - self.filled_quantity);
        if quantity == 0 {
            return;
        }

        let prior_value = self.average_fill_price * self.filled_quantity as f64;
        self.filled_quantity += quantity;
        self.average_fill_price = (prior_value + price * quantity as f64) / self.filled_quantity as f64;
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}
