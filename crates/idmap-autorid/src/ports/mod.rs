//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (allocator, lookup, config, counters)
//! - `outbound.rs` - Driven port (the transactional store)

pub mod inbound;
pub mod outbound;
