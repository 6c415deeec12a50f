//! A server-side runtime that brokers RPC and DataSource transactions
//! between a rich client and pluggable back-end data sources.
//!
//! [`runtime::ServerContext`] is the process-wide shared state; [`http::router`]
//! turns it into a servable [`axum::Router`]. `main.rs` is responsible only for
//! wiring configuration, logging, and the listener around those two pieces.

pub mod coordinator;
pub mod criteria;
pub mod database;
pub mod datasource;
pub mod envelope;
pub mod http;
pub mod logging;
pub mod operation;
pub mod response_formatter;
pub mod runtime;
pub mod setup;
