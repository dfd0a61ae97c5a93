//! Command dispatch and acknowledgment tracking.
//!
//! The dispatcher turns [`DispatchRequest`](smartfarm_core::DispatchRequest)s
//! into published broker messages and walks each command through its
//! lifecycle; the ack tracker closes the loop when the device answers, or
//! fails the command when it does not answer in time.

pub mod ack;
pub mod dispatcher;

pub use ack::AckTracker;
pub use dispatcher::CommandDispatcher;
