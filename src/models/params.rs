use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TradingError;
use crate::models::order::OrderSide;

/// 지정가 상/하한
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceLimit {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl PriceLimit {
    /// 가격을 상/하한 범위 안으로 제한
    pub fn clamp(&self, price: f64) -> f64 {
        let mut price = price;
        if let Some(upper) = self.upper {
            price = price.min(upper);
        }
        if let Some(lower) = self.lower {
            price = price.max(lower);
        }
        price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwapParameters {
    /// 틱 간격 (초). 없으면 전체 구간 / slice_count 로 계산
    pub interval_seconds: Option<u64>,
    /// 계획된 분할 수
    pub slice_count: u32,
    /// 마지막 분할이 max_order_size 를 넘어 잔량 전체를 보낼 수 있는지 여부
    pub allow_overshoot: bool,
}

/// 분(minute-of-day) 단위 거래량 프로필 항목
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeProfileEntry {
    pub time: u32,
    pub expected_volume: f64,
    pub participation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VwapParameters {
    /// 프로필 산출에 사용된 과거 구간 (분)
    pub lookback_period: u32,
    pub volume_profile: Vec<VolumeProfileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PovParameters {
    pub target_participation_rate: f64,
    pub min_participation_rate: f64,
    pub max_participation_rate: f64,
    pub adjustment_factor: f64,
}

/// 알고리즘별 확장 파라미터
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum AlgorithmKind {
    Twap(TwapParameters),
    Vwap(VwapParameters),
    Pov(PovParameters),
}

/// 부모 주문 및 알고리즘 실행 파라미터
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmParameters {
    pub symbol: String,
    pub side: OrderSide,
    pub total_quantity: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub min_order_size: Option<u64>,
    #[serde(default)]
    pub max_order_size: Option<u64>,
    #[serde(default)]
    pub max_participation_rate: Option<f64>,
    #[serde(default)]
    pub price_limit: Option<PriceLimit>,
    pub kind: AlgorithmKind,
}

impl AlgorithmParameters {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        total_quantity: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        kind: AlgorithmKind,
    ) -> Self {
        AlgorithmParameters {
            symbol: symbol.into(),
            side,
            total_quantity,
            start_time,
            end_time,
            min_order_size: None,
            max_order_size: None,
            max_participation_rate: None,
            price_limit: None,
            kind,
        }
    }

    pub fn with_order_size_bounds(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_order_size = min;
        self.max_order_size = max;
        self
    }

    pub fn with_max_participation_rate(mut self, rate: f64) -> Self {
        self.max_participation_rate = Some(rate);
        self
    }

    pub fn with_price_limit(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.price_limit = Some(PriceLimit { upper, lower });
        self
    }

    /// 실행 구간 길이 (초)
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// 제출 시점 기준 파라미터 검증
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TradingError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol must not be empty"));
        }
        if self.total_quantity == 0 {
            return Err(invalid("total_quantity must be positive"));
        }
        if self.start_time >= self.end_time {
            return Err(invalid("start_time must be before end_time"));
        }
        if self.end_time <= now {
            return Err(invalid("end_time must be in the future"));
        }

        if let (Some(min), Some(max)) = (self.min_order_size, self.max_order_size) {
            if min > max {
                return Err(invalid(format!("min_order_size {} exceeds max_order_size {}", min, max)));
            }
        }
        if self.max_order_size == Some(0) {
            return Err(invalid("max_order_size must be positive"));
        }
        if let Some(rate) = self.max_participation_rate {
            check_rate("max_participation_rate", rate)?;
        }
        if let Some(PriceLimit { upper: Some(upper), lower: Some(lower) }) = self.price_limit {
            if lower > upper {
                return Err(invalid("price_limit.lower exceeds price_limit.upper"));
            }
        }

        match &self.kind {
            AlgorithmKind::Twap(twap) => {
                if twap.slice_count == 0 {
                    return Err(invalid("slice_count must be positive"));
                }
                if twap.interval_seconds == Some(0) {
                    return Err(invalid("interval_seconds must be positive"));
                }
            }
            AlgorithmKind::Vwap(vwap) => {
                if vwap.volume_profile.is_empty() {
                    return Err(invalid("volume_profile must not be empty"));
                }
                for entry in &vwap.volume_profile {
                    if entry.time >= 24 * 60 {
                        return Err(invalid(format!("volume_profile time {} is not a minute of day", entry.time)));
                    }
                    if entry.expected_volume < 0.0 || !entry.expected_volume.is_finite() {
                        return Err(invalid("volume_profile expected_volume must be non-negative"));
                    }
                    check_rate("volume_profile participation_rate", entry.participation_rate)?;
                }
            }
            AlgorithmKind::Pov(pov) => {
                check_rate("min_participation_rate", pov.min_participation_rate)?;
                check_rate("target_participation_rate", pov.target_participation_rate)?;
                check_rate("max_participation_rate", pov.max_participation_rate)?;
                if !(pov.min_participation_rate <= pov.target_participation_rate
                    && pov.target_participation_rate <= pov.max_participation_rate)
                {
                    return Err(invalid("participation rates must satisfy min <= target <= max"));
                }
                if pov.adjustment_factor < 0.0 || !pov.adjustment_factor.is_finite() {
                    return Err(invalid("adjustment_factor must be non-negative"));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TradingError {
    TradingError::InvalidParameter(message.into())
}

fn check_rate(name: &str, rate: f64) -> Result<(), TradingError> {
    if rate > 0.0 && rate <= 100.0 {
        Ok(())
    } else {
        Err(invalid(format!("{} must be in (0, 100], got {}", name, rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn twap(now: DateTime<Utc>) -> AlgorithmParameters {
        AlgorithmParameters::new(
            "TEST",
            OrderSide::Buy,
            100,
            now,
            now + Duration::seconds(100),
            AlgorithmKind::Twap(TwapParameters {
                interval_seconds: Some(10),
                slice_count: 10,
                allow_overshoot: false,
            }),
        )
    }

    #[test]
    fn test_valid_twap_parameters() {
        let now = Utc::now();
        assert!(twap(now).validate(now).is_ok());
    }

    #[test]
    fn test_rejects_bad_base_fields() {
        let now = Utc::now();

        let mut p = twap(now);
        p.total_quantity = 0;
        assert!(matches!(p.validate(now), Err(TradingError::InvalidParameter(_))));

        let mut p = twap(now);
        p.symbol = "  ".to_string();
        assert!(p.validate(now).is_err());

        let mut p = twap(now);
        p.end_time = p.start_time;
        assert!(p.validate(now).is_err());

        // 종료 시각이 이미 지난 경우
        let p = twap(now - Duration::seconds(500));
        assert!(p.validate(now).is_err());

        let p = twap(now).with_order_size_bounds(Some(20), Some(10));
        assert!(p.validate(now).is_err());

        let p = twap(now).with_price_limit(Some(110.0), Some(100.0));
        assert!(p.validate(now).is_err());
    }

    #[test]
    fn test_rejects_bad_pov_rates() {
        let now = Utc::now();
        let mut p = twap(now);
        p.kind = AlgorithmKind::Pov(PovParameters {
            target_participation_rate: 30.0,
            min_participation_rate: 5.0,
            max_participation_rate: 20.0,
            adjustment_factor: 1.0,
        });
        assert!(p.validate(now).is_err());
    }

    #[test]
    fn test_parameters_from_json() {
        let json = r#"{
            "symbol": "TEST",
            "side": "Sell",
            "total_quantity": 500,
            "start_time": "2030-01-01T09:00:00Z",
            "end_time": "2030-01-01T10:00:00Z",
            "kind": {
                "type": "VWAP",
                "lookback_period": 30,
                "volume_profile": [
                    { "time": 540, "expected_volume": 1000.0, "participation_rate": 10.0 }
                ]
            }
        }"#;

        let params: AlgorithmParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.side, OrderSide::Sell);
        assert_eq!(params.duration_secs(), 3600.0);
        assert!(matches!(params.kind, AlgorithmKind::Vwap(_)));
        assert!(params.min_order_size.is_none());
    }
}
