//! Core control plane: the gateway, registry, scheduler, audit trail, and
//! the shared primitives they stand on.

pub mod audit;
pub mod check;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod schemas;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod validate;
