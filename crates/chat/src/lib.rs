//! Registry of ephemeral chat sessions with region-scoped matchmaking.
//!
//! Connection handlers create a [`Session`], register it with
//! [`SessionRegistry::set`], flip its ready flag while the user waits for a
//! partner, and [`SessionRegistry::close`] it on disconnect. Matchmaking reads
//! [`SessionRegistry::ready_ids_by_region`] or pairs atomically with
//! [`SessionMap::match_in_region`]; monitoring reads
//! [`SessionRegistry::ready_and_chatting`].
//!
//! # Example
//!
//! ```no_run
//! use tailla_chat::{Session, SessionMap, SessionRegistry};
//!
//! fn example() -> tailla_chat::Result<()> {
//!     let registry = SessionMap::new()?;
//!     registry.set("a", Session::new("a", "uk").with_ready(true).into_shared())?;
//!     registry.set("b", Session::new("b", "uk").with_ready(true).into_shared())?;
//!
//!     if let Some(room) = registry.match_in_region("a")? {
//!         println!("paired in room {}", room.id());
//!     }
//!     let counts = registry.ready_and_chatting()?;
//!     println!("{} ready, {} chatting", counts.ready, counts.chatting);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
mod map;
mod matchmaking;
mod registry;
pub mod session;

pub use config::RegistryConfig;
pub use error::{ConfigError, RegistryError, Result};
pub use map::SessionMap;
pub use registry::{ReadinessCounts, SessionRegistry, Sessions};
pub use session::{Room, Session};
pub use tailla_worker::{CancellationToken, PoolStats};
