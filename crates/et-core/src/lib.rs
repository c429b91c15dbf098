//! eventthreads/crates/et-core/src/lib.rs
//!
//! The thread lifecycle and membership state machine for EventThreads,
//! together with the port traits its adapters implement.

pub mod admin;
pub mod engine;
pub mod error;
pub mod events;
pub mod membership;
pub mod models;
pub mod registry;
pub mod session;
pub mod traits;

// Re-exporting for easier access in other crates
pub use admin::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use membership::*;
pub use models::*;
pub use registry::*;
pub use session::*;
pub use traits::*;
