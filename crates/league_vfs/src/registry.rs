//! The overlay stack of mounted backends.

use crate::backend::{lock_backend, Backend, IndexState, MountFlags, SharedBackend};
use crate::resource::{Completions, LoadState, ReloadCallback, ResourceHandle, SaveState};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sequence index assigned to a backend when it is mounted.
///
/// Higher indices shadow lower ones during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(u64);

impl MountId {
    pub fn index(self) -> u64 {
        self.0
    }
}

/// Flags for [`MountRegistry::resolve`] and [`MountRegistry::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LoadFlags(u32);

impl LoadFlags {
    pub const NONE: Self = Self(0);
    /// Create an empty resource in the first writable backend if no backend has the path.
    pub const TRY_CREATE: Self = Self(1 << 0);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LoadFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone)]
struct MountedBackend {
    root: Utf8PathBuf,
    backend: SharedBackend,
}

#[derive(Default)]
struct RegistryState {
    next_index: u64,
    pending: BTreeMap<u64, MountedBackend>,
    mounted: BTreeMap<u64, MountedBackend>,
    failed: Vec<MountedBackend>,
}

fn lock_state(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish_indexing(state: &Mutex<RegistryState>, index: u64, outcome: IndexState) {
    let mut state = lock_state(state);
    match outcome {
        IndexState::IsIndexed => {
            if let Some(mount) = state.pending.remove(&index) {
                tracing::info!("Mounted {} at index {}", mount.root, index);
                state.mounted.insert(index, mount);
            }
        }
        IndexState::FailedToIndex => {
            if let Some(mount) = state.pending.remove(&index) {
                tracing::warn!("Failed to index {}, it will stay unavailable", mount.root);
                state.failed.push(mount);
            }
        }
        IndexState::NotIndexed => {}
    }
}

/// An overlay stack of storage backends.
///
/// Each registry is an independent context; clones share the same stack.
/// A backend is pending until its indexing completes, and only mounted
/// backends take part in resolution. Indexing is attempted once: a backend
/// that fails to index is parked and never retried.
///
/// The registry never holds its own lock while it calls into a backend, and
/// resource callbacks run after every lock has been released, so a callback
/// may resolve further paths through the same registry.
#[derive(Clone, Default)]
pub struct MountRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        lock_state(&self.state)
    }

    /// Mount a backend on top of the stack and start indexing it.
    pub fn mount<B>(&self, backend: B, flags: MountFlags) -> MountId
    where
        B: Backend + 'static,
    {
        self.mount_shared(Arc::new(Mutex::new(backend)), flags)
    }

    /// Mount a backend that the caller keeps a handle to.
    pub fn mount_shared(&self, backend: SharedBackend, flags: MountFlags) -> MountId {
        let root = {
            let mut backend = lock_backend(&backend);
            backend.set_flags(flags);
            backend.root().to_path_buf()
        };

        let index = {
            let mut state = self.lock();
            let index = state.next_index;
            state.next_index += 1;
            state.pending.insert(
                index,
                MountedBackend {
                    root: root.clone(),
                    backend: backend.clone(),
                },
            );
            index
        };

        let registry = Arc::downgrade(&self.state);
        let outcome = lock_backend(&backend).index_files(Box::new(move |outcome| {
            if let Some(state) = registry.upgrade() {
                finish_indexing(&state, index, outcome);
            }
        }));

        match outcome {
            IndexState::IsIndexed => tracing::info!("Immediately mounted {}", root),
            IndexState::NotIndexed => tracing::info!("Moved {} to mount queue", root),
            IndexState::FailedToIndex => tracing::warn!("Immediately failed to mount {}", root),
        }

        MountId(index)
    }

    /// Mounted backends from highest to lowest sequence index.
    fn mounted_backends(&self) -> Vec<MountedBackend> {
        self.lock().mounted.values().rev().cloned().collect()
    }

    /// Resolve `path` against the mounted backends, last mounted first.
    ///
    /// The returned resource may still be loading.
    pub fn resolve(&self, path: &str, flags: LoadFlags) -> Option<ResourceHandle> {
        let mut completions = Completions::new();
        let resolved = self.resolve_inner(path, flags, None, &mut completions);
        completions.dispatch();
        resolved.map(|(resource, _)| resource)
    }

    /// Resolve `path` and register `callback` for its reload notifications.
    ///
    /// The callback runs immediately if the resource is already loaded. For a
    /// resource created through [`LoadFlags::TRY_CREATE`] it is registered once
    /// the initial write concludes.
    pub fn load<F>(&self, path: &str, flags: LoadFlags, callback: F) -> Option<ResourceHandle>
    where
        F: Fn(&ResourceHandle) + Send + Sync + 'static,
    {
        let callback: ReloadCallback = Arc::new(callback);
        let mut completions = Completions::new();
        let resolved = self.resolve_inner(path, flags, Some(callback.clone()), &mut completions);

        if let Some((resource, false)) = &resolved {
            resource.add_callback(callback);
        }
        completions.dispatch();
        resolved.map(|(resource, _)| resource)
    }

    /// Returns the resource and whether it was created by this call.
    fn resolve_inner(
        &self,
        path: &str,
        flags: LoadFlags,
        on_created: Option<ReloadCallback>,
        completions: &mut Completions,
    ) -> Option<(ResourceHandle, bool)> {
        let backends = self.mounted_backends();

        for mount in &backends {
            let resolved = lock_backend(&mount.backend).resolve(path, false);
            if let Some(resource) = resolved {
                return Some((resource, false));
            }
        }

        if !flags.contains(LoadFlags::TRY_CREATE) {
            return None;
        }

        for mount in &backends {
            let mut backend = lock_backend(&mount.backend);
            if !backend.can_store() || !backend.is_storable(path) {
                continue;
            }

            let relative = backend.relative_path(path);
            let Some(resource) = backend.create(&relative) else {
                continue;
            };

            tracing::debug!("Creating {} in {}", relative, mount.root);
            let on_created = on_created.clone();
            backend.store(
                &resource,
                Some(Box::new(move |resource, state| {
                    resource.complete_load(if state == SaveState::Saved {
                        LoadState::Loaded
                    } else {
                        LoadState::FailedToLoad
                    });
                    if let Some(callback) = on_created {
                        resource.add_callback(callback);
                    }
                })),
                completions,
            );
            return Some((resource, true));
        }

        None
    }

    /// Returns `true` if a mounted backend owns this exact resource.
    pub fn is_valid(&self, resource: &ResourceHandle) -> bool {
        self.mounted_backends()
            .iter()
            .any(|mount| lock_backend(&mount.backend).has(resource))
    }

    /// Returns `true` once nothing is left indexing and at least one backend is mounted.
    ///
    /// Backends that failed to index are not considered.
    pub fn is_fully_mounted(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && !state.mounted.is_empty()
    }

    /// Returns `true` once no mounted backend has outstanding saves.
    pub fn is_ready_to_exit(&self) -> bool {
        self.mounted_backends()
            .iter()
            .all(|mount| lock_backend(&mount.backend).is_ready_to_exit())
    }

    /// Tick every backend: mounted ones in sequence order, then pending ones.
    pub fn update(&self) {
        let backends: Vec<SharedBackend> = {
            let state = self.lock();
            state
                .mounted
                .values()
                .chain(state.pending.values())
                .map(|mount| mount.backend.clone())
                .collect()
        };

        for backend in backends {
            let mut completions = Completions::new();
            lock_backend(&backend).update(&mut completions);
            completions.dispatch();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn mounted_count(&self) -> usize {
        self.lock().mounted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.lock().failed.len()
    }

    /// Roots of the mounted backends, last mounted first.
    pub fn mounted_roots(&self) -> Vec<Utf8PathBuf> {
        self.mounted_backends()
            .into_iter()
            .map(|mount| mount.root)
            .collect()
    }

    /// Returns `true` if a backend with this root is mounted.
    pub fn is_mounted(&self, root: &Utf8Path) -> bool {
        self.lock().mounted.values().any(|mount| mount.root == root)
    }
}
