//! social-gateway domain crate
//!
//! This crate contains the core domain contract following hexagonal
//! architecture:
//! - `model`: Platform-agnostic entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `registry`: Platform → adapter dispatch table

pub mod model;
pub mod ports;
pub mod registry;

pub use model::*;
pub use ports::*;
pub use registry::PlatformRegistry;
