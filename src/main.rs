/**
* filename : main
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use std::sync::Arc;

use chrono::{Duration, Utc};

use xAlgo::config::Config;
use xAlgo::exchange::mocks::MockGateway;
use xAlgo::utils::{logging, Clock, EngineClock};
use xAlgo::{
    AlgorithmEvent, AlgorithmKind, AlgorithmParameters, AlgorithmScheduler, MarketDataCache, MarketSnapshot,
    OrderSide, TwapParameters,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 설정 로드
    let config = Config::load()?;

    // 로깅 초기화
    logging::init(&config.logging)?;
    log::info!("알고리즘 실행 엔진 시작 (v{})", xAlgo::VERSION);

    // 명령줄 인수: 심볼, 수량, 실행 시간(초)
    let args: Vec<String> = std::env::args().collect();
    let symbol = args.get(1).cloned().unwrap_or_else(|| "BTCUSDT".to_string());
    let quantity: u64 = args.get(2).and_then(|v| v.parse().ok()).unwrap_or(100);
    let duration_secs: i64 = args.get(3).and_then(|v| v.parse().ok()).unwrap_or(20);

    let clock: Arc<dyn Clock> = Arc::new(EngineClock::new());
    let market_data = Arc::new(MarketDataCache::new());
    let gateway = Arc::new(MockGateway::new(config.simulation.clone(), market_data.clone(), clock.clone()));
    log::info!("모의 게이트웨이 초기화 완료");

    let scheduler = AlgorithmScheduler::new(&config, gateway, market_data, clock.clone());
    scheduler.update_market_data(&symbol, MarketSnapshot::new(&symbol, 50_000.0, 49_990.0, 50_010.0, 1_000.0, Utc::now()));

    // 이벤트 스트림 출력
    let mut events = scheduler.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                AlgorithmEvent::Progress { instance_id, executed_quantity, remaining_quantity, progress } => {
                    println!("[{}] 체결 {} / 잔량 {} ({:.1}%)", instance_id, executed_quantity, remaining_quantity, progress * 100.0);
                }
                AlgorithmEvent::Error { instance_id, message } => println!("[{}] 오류: {}", instance_id, message),
                _ => {}
            }
        }
    });

    let now = clock.now();
    let params = AlgorithmParameters::new(
        symbol.clone(),
        OrderSide::Buy,
        quantity,
        now,
        now + Duration::seconds(duration_secs),
        AlgorithmKind::Twap(TwapParameters { interval_seconds: None, slice_count: 10, allow_overshoot: false }),
    );

    let id = scheduler.submit(params, vec![]).await?;
    log::info!("TWAP 인스턴스 제출: {}", id);

    let result = scheduler.wait_for_completion(&id).await?;

    println!("\n=== 실행 결과 ===");
    println!("{}", serde_json::to_string_pretty(&result)?);

    let stats = scheduler.statistics();
    println!("\n=== 인스턴스 통계 ===");
    println!("전체: {} - 완료: {} - 취소: {} - 오류: {}", stats.total, stats.completed, stats.cancelled, stats.error);

    Ok(())
}
