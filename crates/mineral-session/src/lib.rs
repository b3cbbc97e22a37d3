//! Player sessions for Mineral.
//!
//! - [`Session`]: one connected player, with their placement and writer.
//! - [`SessionRegistry`]: logged-in players by name, plus broadcasts.
//! - [`IdAllocator`]: entity ids, recycled oldest first.
//! - [`SessionVerifier`]: the online-mode identity check.

mod error;
mod ids;
mod registry;
mod session;
mod verify;

pub use error::SessionError;
pub use ids::{FREE_LIST_CAPACITY, IdAllocator};
pub use registry::SessionRegistry;
pub use session::{Placement, Session, SessionConfig};
pub use verify::{HttpSessionVerifier, SessionVerifier, auth_digest};
