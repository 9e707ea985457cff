//! Loose-file backend over a directory on disk.
//!
//! Loads and saves are queued per parent directory and processed on update
//! ticks. Every directory that holds a tracked file gets a watcher; when it
//! reports a change, the tracked files of that directory are re-stat'ed and
//! the ones with a newer write time are reloaded.

use crate::backend::{Backend, IndexCallback, IndexState, MountFlags};
use crate::config::VfsConfig;
use crate::resource::{
    Completions, LoadState, Resource, ResourceHandle, SaveCallback, SaveState, StoreInbox,
};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime};

/// Change notification for one directory, without per-file granularity.
pub trait DirectoryWatcher: Send {
    /// Returns `true` if something in the directory may have changed since the
    /// last call to [`rearm`](Self::rearm).
    fn poll(&mut self) -> bool;

    /// Called after the backend handled a change.
    fn rearm(&mut self) {}
}

/// Watcher that always reports a change, so every poll interval re-stats the
/// tracked files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollingWatcher;

impl DirectoryWatcher for PollingWatcher {
    fn poll(&mut self) -> bool {
        true
    }
}

/// Creates the watcher for a newly watched directory.
pub type WatcherFactory = Box<dyn Fn(&Utf8Path) -> Box<dyn DirectoryWatcher> + Send>;

struct TrackedFile {
    resource: Weak<Resource>,
    name: String,
    path: Utf8PathBuf,
    last_write: Option<SystemTime>,
}

struct PendingSave {
    resource: ResourceHandle,
    path: Utf8PathBuf,
    callbacks: Vec<SaveCallback>,
}

struct WatchedDirectory {
    watcher: Box<dyn DirectoryWatcher>,
    files: Vec<TrackedFile>,
    load_requests: BTreeMap<Utf8PathBuf, ResourceHandle>,
    save_requests: Vec<PendingSave>,
    last_save: Option<Instant>,
    last_poll: Option<Instant>,
}

impl WatchedDirectory {
    fn new(watcher: Box<dyn DirectoryWatcher>) -> Self {
        Self {
            watcher,
            files: Vec::new(),
            load_requests: BTreeMap::new(),
            save_requests: Vec::new(),
            last_save: None,
            last_poll: None,
        }
    }

    fn track(&mut self, resource: &ResourceHandle, path: &Utf8Path) {
        let last_write = modified(path);
        self.files.retain(|file| file.name != resource.name());
        self.files.push(TrackedFile {
            resource: Arc::downgrade(resource),
            name: resource.name().to_string(),
            path: path.to_path_buf(),
            last_write,
        });
    }

    fn process_loads(&mut self, begin: Instant, config: &VfsConfig, completions: &mut Completions) {
        while let Some((path, resource)) = self.load_requests.pop_first() {
            let state = match fs::read(path.as_std_path()) {
                Ok(data) => {
                    resource.set_data(data);
                    LoadState::Loaded
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => LoadState::NotFound,
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path, e);
                    LoadState::FailedToLoad
                }
            };

            tracing::trace!("Loaded {} ({})", path, state);
            self.track(&resource, &path);
            completions.load(resource, state);

            if begin.elapsed() >= config.tick_budget() {
                break;
            }
        }
    }

    fn process_saves(&mut self, config: &VfsConfig, completions: &mut Completions) {
        if self.save_requests.is_empty() {
            return;
        }
        if self
            .last_save
            .is_some_and(|last| last.elapsed() < config.save_debounce())
        {
            return;
        }
        self.last_save = Some(Instant::now());

        for save in std::mem::take(&mut self.save_requests) {
            let data = save.resource.data();
            let written = if data.is_empty() {
                fs::File::create(save.path.as_std_path()).map(|_| ())
            } else {
                fs::write(save.path.as_std_path(), &data)
            };

            let state = match written {
                Ok(()) if save.path.as_std_path().exists() => SaveState::Saved,
                Ok(()) => SaveState::FailedToSave,
                Err(e) => {
                    tracing::warn!("Failed to write {}: {}", save.path, e);
                    SaveState::FailedToSave
                }
            };

            tracing::debug!("Flushed {} bytes to {} ({:?})", data.len(), save.path, state);
            if state == SaveState::Saved {
                self.track(&save.resource, &save.path);
            }
            completions.save(save.resource, state, save.callbacks);
        }
    }

    /// Re-stat tracked files if the watcher fired, returning the names to reload.
    fn poll_changes(&mut self, config: &VfsConfig, refreshed: &mut Vec<String>) {
        if self
            .last_poll
            .is_some_and(|last| last.elapsed() < config.watch_interval())
        {
            return;
        }
        self.last_poll = Some(Instant::now());

        if !self.watcher.poll() {
            return;
        }

        self.files.retain(|file| file.resource.strong_count() > 0);

        let mut found = false;
        for file in &mut self.files {
            let current = modified(&file.path);
            let changed = match (file.last_write, current) {
                (Some(old), Some(new)) => new > old,
                (old, new) => old.is_some() != new.is_some(),
            };
            if changed {
                tracing::debug!("Detected change to {}", file.path);
                file.last_write = current;
                refreshed.push(file.name.clone());
                found = true;
            }
        }

        if found {
            self.watcher.rearm();
        }
    }
}

fn modified(path: &Utf8Path) -> Option<SystemTime> {
    fs::metadata(path.as_std_path())
        .and_then(|meta| meta.modified())
        .ok()
}

fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(path.as_std_path())
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Backend serving loose files from a directory, with hot reload and
/// debounced writes.
pub struct DirectoryBackend {
    root: Utf8PathBuf,
    config: VfsConfig,
    index_state: IndexState,
    flags: MountFlags,
    files: HashMap<String, ResourceHandle>,
    watched: BTreeMap<Utf8PathBuf, WatchedDirectory>,
    inbox: Arc<StoreInbox>,
    watcher_factory: WatcherFactory,
}

impl DirectoryBackend {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self::with_config(root, VfsConfig::default())
    }

    pub fn with_config(root: impl Into<Utf8PathBuf>, config: VfsConfig) -> Self {
        Self {
            root: root.into(),
            config,
            index_state: IndexState::NotIndexed,
            flags: MountFlags::NONE,
            files: HashMap::new(),
            watched: BTreeMap::new(),
            inbox: StoreInbox::new(true),
            watcher_factory: Box::new(|_| Box::new(PollingWatcher)),
        }
    }

    /// Replace the change notification used for watched directories.
    pub fn with_watcher<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Utf8Path) -> Box<dyn DirectoryWatcher> + Send + 'static,
    {
        self.watcher_factory = Box::new(factory);
        self
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Number of resources currently in the identity table.
    pub fn resource_count(&self) -> usize {
        self.files.len()
    }

    fn full_path(&self, name: &str) -> Utf8PathBuf {
        if self.root.as_str().is_empty() {
            Utf8PathBuf::from(name)
        } else {
            self.root.join(name)
        }
    }

    fn watched_dir(&mut self, path: &Utf8Path) -> &mut WatchedDirectory {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let key = absolute(parent);

        let factory = &self.watcher_factory;
        self.watched.entry(key).or_insert_with_key(|key| {
            tracing::debug!("Watching directory {}", key);
            WatchedDirectory::new(factory(key))
        })
    }

    fn queue_load(&mut self, resource: ResourceHandle) {
        let path = self.full_path(resource.name());
        tracing::trace!("Queued load of {}", path);
        self.watched_dir(&path).load_requests.insert(path, resource);
    }

    fn queue_save(&mut self, resource: ResourceHandle, on_save: Option<SaveCallback>) {
        let path = self.full_path(resource.name());
        let dir = self.watched_dir(&path);

        let pending = match dir
            .save_requests
            .iter_mut()
            .position(|save| Arc::ptr_eq(&save.resource, &resource))
        {
            Some(index) => &mut dir.save_requests[index],
            None => {
                dir.save_requests.push(PendingSave {
                    resource: resource.clone(),
                    path,
                    callbacks: Vec::new(),
                });
                let last = dir.save_requests.len() - 1;
                &mut dir.save_requests[last]
            }
        };
        pending.callbacks.extend(on_save);
        resource.mark_save_in_progress();
    }

    fn cleanup(&mut self) {
        let before = self.files.len();
        self.files.retain(|_, resource| {
            Arc::strong_count(resource) > 1 || !resource.load_state().is_concluded()
        });

        let dropped = before - self.files.len();
        if dropped > 0 {
            tracing::trace!("Released {} unreferenced resources from {}", dropped, self.root);
        }
    }
}

impl Backend for DirectoryBackend {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn index_state(&self) -> IndexState {
        self.index_state
    }

    fn index_files(&mut self, on_indexed: IndexCallback) -> IndexState {
        self.index_state = if self.root.as_str().is_empty() || self.root.as_std_path().exists() {
            IndexState::IsIndexed
        } else {
            tracing::warn!("Directory root {} does not exist", self.root);
            IndexState::FailedToIndex
        };

        on_indexed(self.index_state);
        self.index_state
    }

    /// Only regular files below the root exist here.
    fn exists(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        if !self.is_storable(&normalized) {
            return false;
        }
        let name = self.relative_path(&normalized);
        self.full_path(&name).as_std_path().is_file()
    }

    fn resolve(&mut self, path: &str, invalidate: bool) -> Option<ResourceHandle> {
        let name = self.relative_path(path);

        if let Some(resource) = self.files.get(&name).cloned() {
            if invalidate {
                self.queue_load(resource.clone());
            }
            return Some(resource);
        }

        if !invalidate && !self.exists(path) {
            return None;
        }

        let resource = Resource::create(name.clone(), self.root.clone(), Some(self.inbox.clone()));
        self.files.insert(name, resource.clone());
        self.queue_load(resource.clone());
        Some(resource)
    }

    fn has(&self, resource: &ResourceHandle) -> bool {
        self.files
            .get(resource.name())
            .is_some_and(|owned| Arc::ptr_eq(owned, resource))
    }

    fn set_flags(&mut self, flags: MountFlags) {
        self.flags = flags;
        self.inbox.set_can_store(self.can_store());
    }

    fn can_store(&self) -> bool {
        !self.flags.contains(MountFlags::CANT_STORE)
    }

    fn is_storable(&self, path: &str) -> bool {
        let path = Utf8Path::new(path);
        if path
            .components()
            .any(|component| component == Utf8Component::ParentDir)
        {
            return false;
        }
        if path.is_absolute() {
            return path.starts_with(absolute(&self.root));
        }

        match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => {
                self.full_path(parent.as_str()).as_std_path().is_dir()
            }
            _ => true,
        }
    }

    fn relative_path(&self, path: &str) -> String {
        let normalized = path.replace('\\', "/");
        let as_path = Utf8Path::new(&normalized);
        if as_path.is_absolute() {
            if let Ok(stripped) = as_path.strip_prefix(absolute(&self.root)) {
                return stripped.as_str().to_string();
            }
        }
        normalized
    }

    fn create(&mut self, path: &str) -> Option<ResourceHandle> {
        let name = self.relative_path(path);
        let resource = self
            .files
            .entry(name)
            .or_insert_with_key(|name| {
                Resource::create(name.clone(), self.root.clone(), Some(self.inbox.clone()))
            })
            .clone();
        Some(resource)
    }

    fn store(
        &mut self,
        resource: &ResourceHandle,
        on_save: Option<SaveCallback>,
        completions: &mut Completions,
    ) {
        if !self.can_store() {
            completions.save(
                resource.clone(),
                SaveState::NotSupported,
                on_save.into_iter().collect(),
            );
            return;
        }

        self.files
            .entry(resource.name().to_string())
            .or_insert_with(|| resource.clone());
        self.queue_save(resource.clone(), on_save);
    }

    fn update(&mut self, completions: &mut Completions) {
        let begin = Instant::now();

        for request in self.inbox.drain() {
            self.queue_save(request.resource, request.on_save);
        }

        let mut refreshed = Vec::new();
        if self.index_state == IndexState::IsIndexed {
            for dir in self.watched.values_mut() {
                dir.process_loads(begin, &self.config, completions);
                dir.process_saves(&self.config, completions);

                if begin.elapsed() < self.config.tick_budget() {
                    dir.poll_changes(&self.config, &mut refreshed);
                }
            }
        }

        for name in refreshed {
            tracing::debug!("Refreshing {}", name);
            self.resolve(&name, true);
        }

        self.cleanup();
    }

    fn is_ready_to_exit(&self) -> bool {
        self.inbox.is_empty() && self.watched.values().all(|dir| dir.save_requests.is_empty())
    }
}
