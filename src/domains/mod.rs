//! Per-domain operation handlers. Each module owns its parameter tables,
//! row types, and handlers; the operation registry wires them to
//! `(domain, action)` pairs and the gateway is the only caller.

pub mod audit_log;
pub mod certificates;
pub mod credentials;
pub mod equipment;
pub mod events;
pub mod pm;
