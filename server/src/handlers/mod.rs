//! API handlers for the marketplace order core

pub mod extract;
pub mod orders;
pub mod payment;

pub use orders::*;
pub use payment::*;
