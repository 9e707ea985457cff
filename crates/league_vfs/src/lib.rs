//! Layered virtual storage for League of Legends assets.
//!
//! This crate turns several storage backends into one resolution service:
//!
//! - **Resources**: named byte buffers with a load/save state machine and
//!   reload subscribers ([`Resource`]). A backend owns at most one live
//!   resource per path, and every consumer shares it through a [`ResourceHandle`].
//! - **Backends**: providers of resources ([`Backend`]). The crate ships a
//!   hot-reloading loose-directory backend ([`DirectoryBackend`]); archive
//!   backends live in the format crates.
//! - **Mount registry**: an overlay stack of backends ([`MountRegistry`]).
//!   The last mounted backend shadows earlier ones, and a backend only becomes
//!   visible once its indexing has completed.
//!
//! Nothing in here blocks on IO when a path is resolved. A resolved resource
//! may still be [`LoadState::NotLoaded`]; it is filled on a later
//! [`MountRegistry::update`] tick and its subscribers are notified then.
//!
//! # Example
//!
//! ```no_run
//! use league_vfs::{DirectoryBackend, LoadFlags, MountFlags, MountRegistry};
//!
//! let registry = MountRegistry::new();
//! registry.mount(DirectoryBackend::new("assets"), MountFlags::NONE);
//!
//! let handle = registry.load("data/config.txt", LoadFlags::NONE, |resource| {
//!     println!("{} is {}", resource.name(), resource.load_state());
//! });
//!
//! while handle.as_ref().is_some_and(|r| !r.load_state().is_concluded()) {
//!     registry.update();
//! }
//! ```

pub mod backend;
pub mod config;
pub mod directory;
pub mod error;
pub mod registry;
pub mod resource;

pub use backend::{lock_backend, Backend, IndexCallback, IndexState, MountFlags, SharedBackend};
pub use config::VfsConfig;
pub use directory::{DirectoryBackend, DirectoryWatcher, PollingWatcher, WatcherFactory};
pub use error::{Error, Result};
pub use registry::{LoadFlags, MountId, MountRegistry};
pub use resource::{
    CallbackId, Completions, LoadState, ReloadCallback, Resource, ResourceHandle, SaveCallback,
    SaveRequest, SaveState, StoreInbox,
};
