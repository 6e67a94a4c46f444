/**
* filename : config
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::TradingError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 게이트웨이 호출 하나당 제한 시간
    pub tick_timeout_ms: u64,
    /// 연속 시장 데이터 부재 허용 횟수
    pub max_market_data_failures: u32,
    /// 게이트웨이 주문 생성 시도 횟수 (1 = 재시도 없음)
    pub gateway_max_attempts: u32,
    pub gateway_retry_backoff_ms: u64,
    pub vwap_interval_secs: u64,
    pub pov_interval_secs: u64,
    /// 완료 시 미체결 하위 주문 취소 여부
    pub cancel_open_orders_on_complete: bool,
    /// 이벤트 브로드캐스트 채널 용량
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 지정가 주문 즉시 체결 비율 (0.0 ~ 1.0)
    pub limit_fill_ratio: f64,
    /// 시장가 체결가 무작위 변동 폭 (bp)
    pub price_jitter_bps: f64,
    /// 주문 응답 지연
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsModel {
    Fixed,
    Arrival,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub model: MetricsModel,
    pub fixed_slippage: f64,
    pub fixed_timing_cost: f64,
    pub fixed_market_impact: f64,
}

impl Config {
    /// Load configuration from `config.json` in the working directory
    pub fn load() -> Result<Self, TradingError> {
        Self::load_from("config.json")
    }

    /// Load configuration from a file, falling back to defaults when it is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, TradingError> {
        let config_path = path.as_ref();

        let mut cfg = if config_path.exists() {
            let mut file = File::open(config_path)
                .map_err(|e| TradingError::ConfigError(format!("Failed to open config file: {}", e)))?;

            let mut contents = String::new();
            file.read_to_string(&mut contents)
                .map_err(|e| TradingError::ConfigError(format!("Failed to read config file: {}", e)))?;

            Self::from_json(&contents)?
        } else {
            Config::default()
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(contents: &str) -> Result<Self, TradingError> {
        serde_json::from_str(contents)
            .map_err(|e| TradingError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides for runtime fields
    fn apply_env_overrides(&mut self) {
        use std::env;
        if let Ok(v) = env::var("ALGO_TICK_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() { self.engine.tick_timeout_ms = ms; }
        }
        if let Ok(v) = env::var("ALGO_GATEWAY_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() { self.engine.gateway_max_attempts = n; }
        }
        if let Ok(v) = env::var("ALGO_MAX_MARKET_DATA_FAILURES") {
            if let Ok(n) = v.parse() { self.engine.max_market_data_failures = n; }
        }
        if let Ok(v) = env::var("ALGO_LOG_LEVEL") {
            if !v.is_empty() { self.logging.level = v; }
        }
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.engine.tick_timeout_ms == 0 {
            return Err(TradingError::ConfigError("tick_timeout_ms must be positive".to_string()));
        }
        if self.engine.gateway_max_attempts == 0 {
            return Err(TradingError::ConfigError("gateway_max_attempts must be at least 1".to_string()));
        }
        if self.engine.vwap_interval_secs == 0 || self.engine.pov_interval_secs == 0 {
            return Err(TradingError::ConfigError("algorithm intervals must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.simulation.limit_fill_ratio) {
            return Err(TradingError::ConfigError("limit_fill_ratio must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn tick_timeout(&self) -> Duration {
        Duration::from_millis(self.tick_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.gateway_retry_backoff_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tick_timeout_ms: 5000,
            max_market_data_failures: 3,
            gateway_max_attempts: 1,
            gateway_retry_backoff_ms: 250,
            vwap_interval_secs: 60,
            pov_interval_secs: 30,
            cancel_open_orders_on_complete: true,
            event_buffer: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            limit_fill_ratio: 1.0,
            price_jitter_bps: 0.0,
            latency_ms: 0,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            model: MetricsModel::Fixed,
            fixed_slippage: 0.0,
            fixed_timing_cost: 0.0,
            fixed_market_impact: 0.0,
        }
    }
}
