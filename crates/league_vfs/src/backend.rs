//! The storage backend contract.

use crate::resource::{Completions, ResourceHandle, SaveCallback, SaveState};
use camino::Utf8Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Indexing state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    NotIndexed,
    FailedToIndex,
    IsIndexed,
}

/// Callback through which a backend reports the end of its indexing.
///
/// It may be invoked synchronously from [`Backend::index_files`] or later from
/// [`Backend::update`]. The callback never locks the backend that invokes it.
pub type IndexCallback = Box<dyn FnOnce(IndexState) + Send>;

/// Capability flags applied to a backend when it is mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MountFlags(u32);

impl MountFlags {
    pub const NONE: Self = Self(0);
    /// Refuse every save, even if the backend could persist.
    pub const CANT_STORE: Self = Self(1 << 0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for MountFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A provider of [`Resource`](crate::Resource)s.
///
/// Backends are shared behind a mutex ([`SharedBackend`]) and only touched
/// from [`MountRegistry`](crate::MountRegistry) calls. Operations that change a
/// resource's state record it in a [`Completions`] list instead of notifying
/// subscribers directly; the registry dispatches it once the backend lock has
/// been released.
pub trait Backend: Send {
    /// Root the backend serves from. Resource names are relative to it.
    fn root(&self) -> &Utf8Path;

    fn index_state(&self) -> IndexState;

    /// Start indexing. `on_indexed` is called exactly once with the outcome.
    ///
    /// The returned state is the state right after the call: a backend that
    /// indexes synchronously returns the final state here as well as passing
    /// it to the callback.
    fn index_files(&mut self, on_indexed: IndexCallback) -> IndexState;

    /// Returns `true` if `path` is known to this backend without resolving it.
    fn exists(&self, path: &str) -> bool;

    /// Return the resource for `path`, creating it and queueing a load if it is
    /// new. With `invalidate` set, an existing resource is queued for reload.
    fn resolve(&mut self, path: &str, invalidate: bool) -> Option<ResourceHandle>;

    /// Identity membership test: is this exact resource owned by the backend?
    fn has(&self, resource: &ResourceHandle) -> bool;

    fn set_flags(&mut self, flags: MountFlags);

    fn can_store(&self) -> bool {
        false
    }

    /// Returns `true` if `path` falls inside the namespace this backend can write.
    fn is_storable(&self, _path: &str) -> bool {
        false
    }

    /// Map a registry path to the backend-relative name used for resources.
    fn relative_path(&self, path: &str) -> String {
        path.replace('\\', "/")
    }

    /// Insert an empty resource for `path` without loading it, for create-if-missing.
    fn create(&mut self, _path: &str) -> Option<ResourceHandle> {
        None
    }

    /// Queue a save of `resource`. `on_save` runs when the write concludes.
    fn store(
        &mut self,
        resource: &ResourceHandle,
        on_save: Option<SaveCallback>,
        completions: &mut Completions,
    ) {
        completions.save(
            resource.clone(),
            SaveState::NotSupported,
            on_save.into_iter().collect(),
        );
    }

    /// Process a bounded amount of queued work.
    fn update(&mut self, completions: &mut Completions);

    /// Returns `true` once no save requests are outstanding.
    fn is_ready_to_exit(&self) -> bool;
}

/// A mounted backend, shared between the registry and index callbacks.
pub type SharedBackend = Arc<Mutex<dyn Backend>>;

/// Lock a shared backend, recovering from a poisoned lock.
pub fn lock_backend(backend: &SharedBackend) -> MutexGuard<'_, dyn Backend + 'static> {
    backend.lock().unwrap_or_else(PoisonError::into_inner)
}
