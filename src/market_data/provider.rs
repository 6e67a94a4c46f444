use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::market_data::MarketSnapshot;

/// 최신 시장 스냅샷 제공자 인터페이스
pub trait MarketDataFeed: Send + Sync {
    /// 심볼의 최신 스냅샷 (없으면 None)
    fn latest_snapshot(&self, symbol: &str) -> Option<Arc<MarketSnapshot>>;
}

/// 심볼별 최신 스냅샷 캐시.
///
/// 쓰기는 새 스냅샷을 만든 뒤 포인터만 교체하고, 읽기는 `Arc` 를 복사해
/// 곧바로 락을 놓는다. 틱 동안 락을 잡고 있지 않는다.
#[derive(Default)]
pub struct MarketDataCache {
    snapshots: RwLock<HashMap<String, Arc<MarketSnapshot>>>,
}

impl MarketDataCache {
    pub fn new() -> Self {
        MarketDataCache {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// 스냅샷 갱신 (외부 실시간 피드가 호출)
    pub fn update(&self, snapshot: MarketSnapshot) {
        let symbol = snapshot.symbol.clone();
        let published = Arc::new(snapshot);
        let mut guard = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(symbol, published);
    }

    /// 심볼 제거
    pub fn remove(&self, symbol: &str) -> Option<Arc<MarketSnapshot>> {
        let mut guard = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        let guard = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        guard.keys().cloned().collect()
    }
}

impl MarketDataFeed for MarketDataCache {
    fn latest_snapshot(&self, symbol: &str) -> Option<Arc<MarketSnapshot>> {
        let guard = self.snapshots.read().unwrap_or_else(|e| e.into_inner());
        guard.get(symbol).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_update_then_read() {
        let cache = MarketDataCache::new();
        assert!(cache.latest_snapshot("TEST").is_none());

        cache.update(MarketSnapshot::new("TEST", 100.0, 99.5, 100.5, 1000.0, Utc::now()));
        let first = cache.latest_snapshot("TEST").unwrap();
        assert_eq!(first.price, 100.0);

        cache.update(MarketSnapshot::new("TEST", 101.0, 100.5, 101.5, 800.0, Utc::now()));

        // 이전에 읽은 스냅샷은 그대로 유지
        assert_eq!(first.price, 100.0);
        assert_eq!(cache.latest_snapshot("TEST").unwrap().price, 101.0);
        assert_eq!(cache.symbols(), vec!["TEST".to_string()]);

        cache.remove("TEST");
        assert!(cache.latest_snapshot("TEST").is_none());
    }

    #[test]
    fn test_concurrent_readers() {
        let cache = Arc::new(MarketDataCache::new());
        cache.update(MarketSnapshot::new("TEST", 100.0, 99.5, 100.5, 1000.0, Utc::now()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i == 0 {
                            cache.update(MarketSnapshot::new("TEST", 100.0, 99.5, 100.5, 1000.0, Utc::now()));
                        } else {
                            assert!(cache.latest_snapshot("TEST").is_some());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
