//! Domain Layer
//!
//! Entities, error kinds and the outbound ports the lookup service depends on.

pub mod entities;
pub mod errors;
pub mod ports;
