use async_trait::async_trait;

use crate::error::TradingError;
use crate::models::order::{Order, OrderId, OrderRequest};

/// The `OrderGateway` trait defines the interface for placing child orders with a broker.
/// It is implemented by real broker connectors and the simulated gateway.
///
/// Methods take `&self`; implementations guard their own state so many
/// algorithm instances can submit concurrently.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create a child order. The returned order carries any fill that happened immediately.
    async fn create_order(&self, request: OrderRequest) -> Result<Order, TradingError>;

    /// Cancel an open order
    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), TradingError>;
}
