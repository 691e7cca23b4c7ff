//! Persistence layer — backend-agnostic store trait plus the in-memory
//! reference backend.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::ReviewStore;
