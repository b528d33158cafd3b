//! Pure domain logic for the CitySense warning engine.
//!
//! Everything in this crate is side-effect free: the detectors take the
//! event/reading snapshot as arguments and return warnings, never touching
//! storage or the clock behind the caller's back. This crate has zero
//! internal deps so it can be tested in isolation.

pub mod cluster;
pub mod config;
pub mod correlation;
pub mod dedup;
pub mod error;
pub mod geo;
pub mod stats;
pub mod streak;
pub mod time;
pub mod types;
