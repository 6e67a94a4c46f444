use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::error::TradingError;
use crate::exchange::traits::OrderGateway;
use crate::market_data::MarketDataFeed;
use crate::models::order::{Order, OrderId, OrderRequest, OrderSide, OrderStatus, OrderType};
use crate::utils::Clock;

#[derive(Default)]
struct GatewayState {
    orders: HashMap<OrderId, Order>,
    order_id_counter: u64,
}

/// A simulated `OrderGateway` for testing and development.
///
/// Market orders fill completely at the touch (ask for buys, bid for sells) of
/// the latest snapshot. Limit orders fill `limit_fill_ratio` of their quantity
/// at the limit price and rest for the remainder.
pub struct MockGateway {
    config: SimulationConfig,
    market_data: Arc<dyn MarketDataFeed>,
    clock: Arc<dyn Clock>,
    state: Mutex<GatewayState>,
}

impl MockGateway {
    pub fn new(config: SimulationConfig, market_data: Arc<dyn MarketDataFeed>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            market_data,
            clock,
            state: Mutex::new(GatewayState::default()),
        }
    }

    /// All orders seen so far, oldest first
    pub async fn orders(&self) -> Vec<Order> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.id.0.trim_start_matches("mock-").parse::<u64>().unwrap_or(0));
        orders
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    fn market_fill_price(&self, request: &OrderRequest) -> Result<f64, TradingError> {
        let snapshot = self
            .market_data
            .latest_snapshot(&request.symbol)
            .ok_or_else(|| TradingError::ExchangeError(format!("No reference price for {}", request.symbol)))?;

        let touch = match request.side {
            OrderSide::Buy if snapshot.ask > 0.0 => snapshot.ask,
            OrderSide::Sell if snapshot.bid > 0.0 => snapshot.bid,
            _ => snapshot.price,
        };

        if self.config.price_jitter_bps > 0.0 {
            let bps = rand::thread_rng().gen_range(-self.config.price_jitter_bps..=self.config.price_jitter_bps);
            Ok(touch * (1.0 + bps / 10_000.0))
        } else {
            Ok(touch)
        }
    }
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, TradingError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if request.quantity == 0 {
            return Err(TradingError::ExchangeError("Order quantity must be positive".to_string()));
        }

        let mut state = self.state.lock().await;
        state.order_id_counter += 1;
        let order_id = OrderId(format!("mock-{}", state.order_id_counter));
        let mut order = Order::from_request(order_id.clone(), &request, self.clock.now());

        match request.order_type {
            OrderType::Market => {
                let price = self.market_fill_price(&request)?;
                order.apply_fill(request.quantity, price);
            }
            OrderType::Limit => {
                let price = request
                    .price
                    .ok_or_else(|| TradingError::ExchangeError("Limit order without price".to_string()))?;
                let fill_quantity = (request.quantity as f64 * self.config.limit_fill_ratio).floor() as u64;
                order.apply_fill(fill_quantity, price);
            }
        }

        state.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), TradingError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(order_id) {
            Some(order) if order.status.is_open() => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            Some(order) => Err(TradingError::ExchangeError(format!(
                "Order {} is not open: {:?}",
                order_id, order.status
            ))),
            None => Err(TradingError::OrderNotFound(order_id.clone())),
        }
    }
}
