//! Connection management for the query console.
//!
//! Centralizes connection opening, cloning, database tracking and release.

pub mod manager;

pub use manager::ConnectionManager;
