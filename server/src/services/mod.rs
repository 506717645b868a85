//! Business logic services for the marketplace order core

mod order_service;
mod payment_service;

pub use order_service::OrderService;
pub use payment_service::PaymentService;
