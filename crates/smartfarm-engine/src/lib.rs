//! Device communication and automation engine.
//!
//! Connects the broker transport, telemetry ingestion, threshold rules,
//! and the command pipeline into one supervised service. See the member
//! crates for the individual pieces; this crate only wires and runs them.

pub mod ingest;
pub mod router;
pub mod service;

pub use ingest::TelemetryIngestor;
pub use router::MessageRouter;
pub use service::Engine;
