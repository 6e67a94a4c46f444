use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 심볼별 최신 시장 스냅샷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        bid: f64,
        ask: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        MarketSnapshot {
            symbol: symbol.into(),
            price,
            bid,
            ask,
            volume,
            timestamp,
        }
    }

    /// 호가 중간값. 호가가 비어 있으면 최종 체결가 사용
    pub fn mid(&self) -> f64 {
        if self.has_quotes() {
            (self.bid + self.ask) / 2.0
        } else {
            self.price
        }
    }

    pub fn spread(&self) -> f64 {
        if self.has_quotes() {
            self.ask - self.bid
        } else {
            0.0
        }
    }

    fn has_quotes(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.ask >= self.bid
    }
}
