//! Warning lifecycle engine.
//!
//! [`WarningEngine`] owns the warning collection: it pulls a snapshot
//! from a [`source::DataSource`], runs the detection rules from
//! `citysense-core`, deduplicates, appends genuinely new warnings to the
//! live list and history, and persists everything through a
//! `citysense-store` key/value store. A tokio task re-checks on a
//! configurable interval.
//!
//! The engine is a library: no network or CLI surface. The surrounding
//! application constructs it, feeds it data, and renders its views.

mod engine;
mod scheduler;
pub mod source;

pub use engine::WarningEngine;
