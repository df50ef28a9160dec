//! Engine crate – shared backend logic for the vehicle maintenance tracker.
//!
//! Holds the domain model, the status engine, the in-memory store and the
//! capability traits for disk, clock and remote sync. It has no knowledge
//! of HTTP routing or terminal output, so the CLI, the daemon and the
//! data server all drive the same code.

pub mod catalog;
pub mod commands;
pub mod context;
pub mod doctor;
pub mod model;
pub mod persistence;
pub mod platform;
pub mod remote;
pub mod scenario;
pub mod status;
pub mod store;
pub mod sync;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use commands::CommandRegistry;
pub use context::AppContext;
pub use model::{LogEntry, MaintenanceItem, Snapshot, Vehicle};
pub use status::{compute_status, MaintenanceStatus, StatusRecord};
pub use types::{CommandResult, ErrorCode, ErrorInfo, Status};
