// Library crate for the game challenge log server
// This file exposes the public API for integration tests

pub mod event;
pub mod identity;
pub mod room;
pub mod shared;
pub mod stats;
pub mod store;

// Re-export commonly used types for easier access in tests
pub use event::{ChangeFeed, StoreChange};
pub use identity::{Identity, IdentityProvider, InMemoryIdentityProvider};
pub use room::LifecycleService;
pub use shared::{AppError, AppState};
pub use stats::{LiveQuery, StatsService};
pub use store::{ChallengeStore, InMemoryStore};
