//! The unit of loaded data shared between a backend and its consumers.
//!
//! A [`Resource`] is created by the backend that resolves its path and lives in
//! that backend's identity table. Consumers hold a [`ResourceHandle`] and are
//! told about every load or save transition through reload callbacks.
//!
//! Backends never fire callbacks while they hold their own lock. Instead they
//! record transitions in a [`Completions`] list that the caller dispatches
//! once the backend has been released, so a callback is free to resolve more
//! paths through the registry.

use byteorder::{ByteOrder, LittleEndian};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle to a [`Resource`].
pub type ResourceHandle = Arc<Resource>;

/// Callback invoked with the resource after every load or save transition.
pub type ReloadCallback = Arc<dyn Fn(&ResourceHandle) + Send + Sync>;

/// One-shot callback invoked when a save request concludes.
pub type SaveCallback = Box<dyn FnOnce(&ResourceHandle, SaveState) + Send>;

/// Load state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    NotLoaded,
    NotFound,
    FailedToLoad,
    Loaded,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::NotLoaded => "not loaded",
            LoadState::NotFound => "not found",
            LoadState::FailedToLoad => "failed to load",
            LoadState::Loaded => "loaded",
        }
    }

    /// Returns `true` once the backend has finished a load attempt, whatever its outcome.
    pub fn is_concluded(self) -> bool {
        self != LoadState::NotLoaded
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Save state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveState {
    NotSupported,
    NoChanges,
    InProgress,
    FailedToSave,
    Saved,
}

/// Identifies a registered reload callback so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// A named byte buffer with load/save state and reload subscribers.
pub struct Resource {
    name: String,
    root: Utf8PathBuf,
    store: Option<Arc<StoreInbox>>,
    inner: Mutex<ResourceInner>,
}

struct ResourceInner {
    data: Arc<[u8]>,
    load_state: LoadState,
    save_state: SaveState,
    callbacks: Vec<(CallbackId, ReloadCallback)>,
    next_callback: u64,
}

impl Resource {
    /// Create an empty, not yet loaded resource.
    ///
    /// Intended for [`Backend`](crate::Backend) implementations. `root` is the
    /// backend root used by [`full_name`](Self::full_name); `store` is the
    /// backend's save inbox, or `None` for read-only backends.
    pub fn create(
        name: impl Into<String>,
        root: impl Into<Utf8PathBuf>,
        store: Option<Arc<StoreInbox>>,
    ) -> ResourceHandle {
        Arc::new(Self {
            name: name.into(),
            root: root.into(),
            store,
            inner: Mutex::new(ResourceInner {
                data: Arc::from(Vec::new()),
                load_state: LoadState::NotLoaded,
                save_state: SaveState::NoChanges,
                callbacks: Vec::new(),
                next_callback: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ResourceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backend-relative path of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name joined onto the owning backend's root.
    pub fn full_name(&self) -> Utf8PathBuf {
        if self.root.as_str().is_empty() {
            return Utf8PathBuf::from(&self.name);
        }
        self.root.join(Utf8Path::new(&self.name))
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load_state
    }

    pub fn save_state(&self) -> SaveState {
        self.lock().save_state
    }

    /// A view of the current buffer. Reloads swap the buffer, they never
    /// mutate a view that was already handed out.
    pub fn data(&self) -> Arc<[u8]> {
        self.lock().data.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The buffer decoded as UTF-8, with invalid sequences replaced.
    pub fn data_as_string(&self) -> String {
        String::from_utf8_lossy(&self.data()).into_owned()
    }

    /// Replace the whole buffer.
    pub fn set_data(&self, data: impl Into<Arc<[u8]>>) {
        self.lock().data = data.into();
    }

    /// Copy bytes starting at `offset` into `dest` and advance `offset`.
    ///
    /// Reading past the end does not fail: the returned count is reduced to the
    /// bytes that were actually available, and callers decide whether a short
    /// read is acceptable.
    pub fn read(&self, dest: &mut [u8], offset: &mut usize) -> usize {
        let inner = self.lock();
        let available = inner.data.len().saturating_sub(*offset);
        let count = dest.len().min(available);

        if count < dest.len() {
            tracing::warn!(
                "Out of buffer range for '{}': requested {} bytes at {}, returning {}",
                self.name,
                dest.len(),
                offset,
                count
            );
        }
        if count == 0 {
            return 0;
        }

        dest[..count].copy_from_slice(&inner.data[*offset..*offset + count]);
        *offset += count;
        count
    }

    fn read_array<const N: usize>(&self, offset: &mut usize) -> Option<[u8; N]> {
        let mut buf = [0u8; N];
        let mut cursor = *offset;
        if self.read(&mut buf, &mut cursor) != N {
            return None;
        }
        *offset = cursor;
        Some(buf)
    }

    pub fn read_u8(&self, offset: &mut usize) -> Option<u8> {
        self.read_array::<1>(offset).map(|b| b[0])
    }

    pub fn read_u16(&self, offset: &mut usize) -> Option<u16> {
        self.read_array::<2>(offset).map(|b| LittleEndian::read_u16(&b))
    }

    pub fn read_u32(&self, offset: &mut usize) -> Option<u32> {
        self.read_array::<4>(offset).map(|b| LittleEndian::read_u32(&b))
    }

    pub fn read_u64(&self, offset: &mut usize) -> Option<u64> {
        self.read_array::<8>(offset).map(|b| LittleEndian::read_u64(&b))
    }

    pub fn read_f32(&self, offset: &mut usize) -> Option<f32> {
        self.read_array::<4>(offset).map(|b| LittleEndian::read_f32(&b))
    }

    /// Register a reload callback.
    ///
    /// If the resource already concluded a load attempt the callback is invoked
    /// once right away; it is invoked again on every later transition.
    pub fn on_reload<F>(self: &Arc<Self>, callback: F) -> CallbackId
    where
        F: Fn(&ResourceHandle) + Send + Sync + 'static,
    {
        self.add_callback(Arc::new(callback))
    }

    /// Shared-callback form of [`on_reload`](Self::on_reload).
    pub fn add_callback(self: &Arc<Self>, callback: ReloadCallback) -> CallbackId {
        let (id, concluded) = {
            let mut inner = self.lock();
            let id = CallbackId(inner.next_callback);
            inner.next_callback += 1;
            inner.callbacks.push((id, callback.clone()));
            (id, inner.load_state.is_concluded())
        };

        if concluded {
            callback(self);
        }
        id
    }

    /// Unregister a reload callback. Returns `false` if it was not registered.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut inner = self.lock();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(callback_id, _)| *callback_id != id);
        inner.callbacks.len() != before
    }

    /// Subscribe to load transitions through a channel.
    ///
    /// The receiver gets the load state after every transition, including the
    /// immediate one if the resource is already concluded. Drop the receiver
    /// and call [`remove_callback`](Self::remove_callback) to unsubscribe.
    pub fn subscribe(self: &Arc<Self>) -> (CallbackId, mpsc::Receiver<LoadState>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let id = self.on_reload(move |resource| {
            let tx = tx.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = tx.send(resource.load_state());
        });
        (id, rx)
    }

    /// Ask the owning backend to persist the current buffer.
    ///
    /// Read-only backends answer immediately with [`SaveState::NotSupported`].
    /// Otherwise the request is picked up on the backend's next update tick.
    pub fn save(self: &Arc<Self>, on_save: Option<SaveCallback>) {
        match &self.store {
            Some(inbox) if inbox.can_store() => {
                self.lock().save_state = SaveState::InProgress;
                inbox.push(SaveRequest {
                    resource: self.clone(),
                    on_save,
                });
            }
            _ => {
                self.lock().save_state = SaveState::NotSupported;
                if let Some(callback) = on_save {
                    callback(self, SaveState::NotSupported);
                }
            }
        }
    }

    /// Set the save state without notifying subscribers.
    ///
    /// Intended for [`Backend`](crate::Backend) implementations queueing a write.
    pub fn mark_save_in_progress(&self) {
        self.lock().save_state = SaveState::InProgress;
    }

    /// Conclude a load attempt and notify subscribers in registration order.
    ///
    /// Intended for [`Backend`](crate::Backend) implementations, normally via
    /// [`Completions::dispatch`].
    pub fn complete_load(self: &Arc<Self>, state: LoadState) {
        self.lock().load_state = state;
        self.notify();
    }

    /// Conclude a save attempt. Subscribers are only notified for
    /// [`SaveState::Saved`] and [`SaveState::FailedToSave`].
    pub fn complete_save(self: &Arc<Self>, state: SaveState) {
        self.lock().save_state = state;
        if matches!(state, SaveState::Saved | SaveState::FailedToSave) {
            self.notify();
        }
    }

    fn notify(self: &Arc<Self>) {
        // Callbacks run without the lock so they can read the resource.
        let callbacks: Vec<ReloadCallback> = self
            .lock()
            .callbacks
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(self);
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("len", &inner.data.len())
            .field("load_state", &inner.load_state)
            .field("save_state", &inner.save_state)
            .field("callbacks", &inner.callbacks.len())
            .finish()
    }
}

/// A save requested through [`Resource::save`], waiting for its backend.
pub struct SaveRequest {
    pub resource: ResourceHandle,
    pub on_save: Option<SaveCallback>,
}

/// Mailbox through which resources hand save requests to their backend.
///
/// The backend drains it on its update tick. `can_store` mirrors the backend's
/// capability so a read-only mount refuses saves without queueing them.
pub struct StoreInbox {
    can_store: AtomicBool,
    requests: Mutex<Vec<SaveRequest>>,
}

impl StoreInbox {
    pub fn new(can_store: bool) -> Arc<Self> {
        Arc::new(Self {
            can_store: AtomicBool::new(can_store),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn can_store(&self) -> bool {
        self.can_store.load(Ordering::Acquire)
    }

    pub fn set_can_store(&self, can_store: bool) {
        self.can_store.store(can_store, Ordering::Release);
    }

    pub fn push(&self, request: SaveRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    pub fn drain(&self) -> Vec<SaveRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

enum Completion {
    Load(ResourceHandle, LoadState),
    Save(ResourceHandle, SaveState, Vec<SaveCallback>),
}

/// Transitions recorded by a backend during an operation, fired afterwards.
#[derive(Default)]
pub struct Completions {
    pending: Vec<Completion>,
}

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the end of a load attempt.
    pub fn load(&mut self, resource: ResourceHandle, state: LoadState) {
        self.pending.push(Completion::Load(resource, state));
    }

    /// Record the end of a save attempt and the callbacks waiting on it.
    pub fn save(
        &mut self,
        resource: ResourceHandle,
        state: SaveState,
        callbacks: Vec<SaveCallback>,
    ) {
        self.pending
            .push(Completion::Save(resource, state, callbacks));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every recorded transition in order.
    ///
    /// For saves, subscribers are notified first and the per-request save
    /// callbacks run after them.
    pub fn dispatch(self) {
        for completion in self.pending {
            match completion {
                Completion::Load(resource, state) => resource.complete_load(state),
                Completion::Save(resource, state, callbacks) => {
                    resource.complete_save(state);
                    for callback in callbacks {
                        callback(&resource, state);
                    }
                }
            }
        }
    }
}
