//! Room lifecycle: creation, membership, game catalog, match recording,
//! penalties, and the HTTP surface for all of it.

pub mod handlers;
pub mod service;
pub mod types;

pub use service::LifecycleService;
