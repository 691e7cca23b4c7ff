//! Risk-triaged response pipeline.
//!
//! Given an inbound user chat message, classify its risk, decide whether
//! the AI-generated reply may go out automatically or must be held for
//! counselor review, route held items through a priority queue with
//! per-priority SLA deadlines, support counselor actions
//! (approve/modify/reject/escalate), and auto-resolve items that age past
//! their deadline. A user gets exactly one final reply per message and is
//! never left waiting indefinitely.

pub mod assignment;
pub mod clock;
pub mod config;
pub mod error;
pub mod external;
pub mod review;
pub mod scanner;
pub mod service;
pub mod store;
pub mod triage;

pub use config::TriageConfig;
pub use error::{Error, Result};
pub use service::{InboundMessage, TriageOutcome, TriageService};
