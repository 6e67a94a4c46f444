//! 주문 게이트웨이 인터페이스와 모의 구현

pub mod mocks;
pub mod traits;

pub use traits::OrderGateway;
