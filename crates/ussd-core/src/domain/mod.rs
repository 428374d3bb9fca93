/// Session aggregate
pub mod session;

/// Domain events
pub mod events;

/// Repository interfaces
pub mod repository;
