//! Shared functionality
//!
//! Value types and result aliases used by all rasterkit crates.
//!

pub mod types;
