//! Application Layer
//!
//! Use cases that orchestrate the domain ports.

pub mod lookup_service;

pub use lookup_service::LookupService;
