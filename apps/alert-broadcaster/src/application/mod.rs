//! Application layer - Use cases and port definitions.

/// Port interfaces to external collaborators.
pub mod ports;

/// Service implementations.
pub mod services;
