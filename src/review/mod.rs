//! Held-item review: data model, queue, lifecycle state machine, metrics.

pub mod metrics;
pub mod model;
pub mod queue;
pub mod state;

pub use metrics::{QueueMetrics, QueueSnapshot};
pub use queue::ReviewQueue;
pub use state::{ResolutionOutcome, ReviewStateMachine};
