//! Now-playing state engine.
//!
//! Merges per-channel track notifications, catalog lookups and a
//! multi-backend favorites store into one stream of `AppState` snapshots.
//! See [`engine::StateEngine`] for the entry point.

pub mod backend;
pub mod catalog;
pub mod channel;
pub mod composer;
pub mod engine;
pub mod error;
pub mod favorites;
pub mod session;

pub use backend::{Backend, LocalBackend, PlaylistStore, RemoteBackend};
pub use catalog::{CatalogMatcher, CatalogService, StaticCatalog};
pub use channel::{ChannelHistory, ChannelSource, Transition};
pub use composer::{StateUpdate, Update};
pub use engine::{EngineOptions, RemoteServices, StateEngine};
pub use error::{BackendKind, EngineError};
pub use favorites::{CommandSource, FavoritesSync};
pub use session::{IdentityService, SessionResolver};
