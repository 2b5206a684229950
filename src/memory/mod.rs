//! Memory plugin seam: one of §2's "Plugin interfaces (identity, payment,
//! skills, memory)". The core depends only on the [`Memory`] trait; a
//! concrete store (in-process, embedded, remote) is supplied by the host.

pub mod traits;

pub use traits::{Memory, MemoryCategory, MemoryEntry};
