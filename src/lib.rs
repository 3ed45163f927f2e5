//! Farrin session layer — request gateway, durable session cache, auth flow and data sync.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod session;
pub mod sync;
