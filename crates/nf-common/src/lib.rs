//! NetFlow State Discovery common types, IDs, and errors.
//!
//! This crate provides foundational types shared across nf-core modules:
//! - Flow identity and grouping types
//! - The raw flow record consumed at the store boundary
//! - Per-state signature and profile shapes
//! - Common error types

pub mod error;
pub mod flow;

pub use error::{Error, ErrorCategory, Result};
pub use flow::{
    FlowId, FlowRecord, GroupId, PortCategory, Protocol, StateProfile, StateSignature,
};
