// Validated configuration value objects
pub mod config;

// Port interfaces
pub mod ports;

// Immutable metrics snapshot
pub mod snapshot;

pub use snapshot::Snapshot;
