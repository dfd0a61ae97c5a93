//! Threshold rule evaluation.
//!
//! Every accepted reading is checked against the enabled rules of its room.
//! A rule that fires emits an event and hands a dispatch request to the
//! command pipeline; evaluation itself never publishes to the broker.

pub mod engine;

pub use engine::RuleEngine;
