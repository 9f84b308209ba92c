//! Shared utilities for relaydeck

pub mod sleep;

pub use sleep::*;
