//! Query tab management.

pub mod lifecycle;

pub use lifecycle::TabLifecycle;
