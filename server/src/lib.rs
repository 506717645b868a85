//! Marketplace order and payment core
//!
//! Order lifecycle, payment gateway callbacks and inventory reconciliation
//! for a multi-tenant marketplace, served over axum.

pub mod app_state;
pub mod auth;
pub mod cache;
pub mod carrier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod inventory;
pub mod models;
pub mod order_state;
pub mod payment;
pub mod routes;
pub mod services;
pub mod store;
