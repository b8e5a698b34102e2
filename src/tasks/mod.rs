//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Purges entries older than the configured maximum age

mod cleanup;

pub use cleanup::spawn_expiry_task;
