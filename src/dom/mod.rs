pub mod memory;

pub use memory::{DispatchedEvent, MemoryDocument};
