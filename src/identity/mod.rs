//! Identity plugin seam: the core asks an [`IdentityProvider`] for a
//! snapshot to build a session's system prompt from; it never reads
//! identity data off disk itself.

pub mod traits;
pub mod types;

pub use traits::{IdentityProvider, StaticIdentityProvider};
pub use types::IdentitySnapshot;
