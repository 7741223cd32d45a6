//! Operator implementations.
//!
//! One file per operator family, each built from the sink base in
//! `crate::sink` plus the coordination primitives
//! (`crate::serializer`, `crate::trampoline`, `crate::async_lock`) where
//! concurrent or reentrant delivery is possible.

pub mod aggregate;
pub mod concat;
pub mod filter;
pub mod finalize;
pub mod map;
pub mod merge;
pub mod retry_when;
pub mod scan;
pub mod skip;
pub mod subscribe_on;
pub mod switch;
pub mod take;
pub mod window;
