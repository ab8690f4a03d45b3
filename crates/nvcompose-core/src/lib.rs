//! nvcompose-core: Core types for the GPU-enabled compose wrapper
//!
//! This crate provides the pieces that do not touch the outside world:
//! - Compose document and service definition types
//! - GPU device sets reported by the GPU runtime
//! - The merge that injects GPU devices and volumes into every service
//! - Compose templates rendered with the GPU device set
//! - Configuration types
//! - Error handling

pub mod compose;
pub mod config;
pub mod error;
pub mod gpu;
pub mod merge;
pub mod template;

pub use compose::*;
pub use config::*;
pub use error::*;
pub use gpu::*;
pub use merge::*;
pub use template::*;
