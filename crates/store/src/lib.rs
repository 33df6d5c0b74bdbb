//! Reference persistence collaborators: an in-memory repository for tests and
//! embedding, and a JSON-file repository for the admin CLI.

#![warn(clippy::unwrap_used)]

pub mod counter;
pub mod file;
pub mod memory;

pub use counter::FixedRowCounter;
pub use file::FileRepository;
pub use memory::MemoryRepository;
