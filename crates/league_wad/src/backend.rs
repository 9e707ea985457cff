//! Read-only storage backend serving the entries of every WAD under a root.

use crate::archive::{hash_path, subchunk_toc_path, SubChunkToc, WadArchive};
use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use league_vfs::{
    Backend, Completions, DirectoryBackend, IndexCallback, IndexState, LoadState, MountFlags,
    MountId, MountRegistry, Resource, ResourceHandle, VfsConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

struct ExtractRequest {
    resource: ResourceHandle,
    path_hash: u64,
    archive: usize,
}

/// Backend that resolves asset paths against the entry tables of the WAD
/// archives found under its root.
///
/// Indexing is deferred to the first [`update`](Backend::update) tick: the
/// root is scanned for archives, each one is parsed, and the backend fails to
/// index if any of them is malformed. When two archives contain the same
/// path, the one that sorts first by path wins.
pub struct WadBackend {
    root: Utf8PathBuf,
    config: VfsConfig,
    index_state: IndexState,
    on_indexed: Option<IndexCallback>,
    archives: Vec<WadArchive>,
    lookup: HashMap<u64, usize>,
    files: HashMap<String, ResourceHandle>,
    requests: VecDeque<ExtractRequest>,
}

impl WadBackend {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self::with_config(root, VfsConfig::default())
    }

    pub fn with_config(root: impl Into<Utf8PathBuf>, config: VfsConfig) -> Self {
        Self {
            root: root.into(),
            config,
            index_state: IndexState::NotIndexed,
            on_indexed: None,
            archives: Vec::new(),
            lookup: HashMap::new(),
            files: HashMap::new(),
            requests: VecDeque::new(),
        }
    }

    /// Mount a WAD backend over `root` together with a read-only directory
    /// backend over the same root, so the archive files themselves resolve too.
    ///
    /// Returns the ids of the directory mount and of the archive mount.
    pub fn mount(
        registry: &MountRegistry,
        root: impl Into<Utf8PathBuf>,
        config: VfsConfig,
    ) -> (MountId, MountId) {
        let root = root.into();
        let directory = registry.mount(
            DirectoryBackend::with_config(root.clone(), config.clone()),
            MountFlags::CANT_STORE,
        );
        let archives = registry.mount(Self::with_config(root, config), MountFlags::CANT_STORE);
        (directory, archives)
    }

    pub fn archives(&self) -> &[WadArchive] {
        &self.archives
    }

    /// Number of distinct path hashes across all archives.
    pub fn entry_count(&self) -> usize {
        self.lookup.len()
    }

    /// Scan the root and parse every archive, replacing any previous index.
    pub fn index_now(&mut self) -> Result<()> {
        let mut archives = Vec::new();

        for entry in WalkDir::new(self.root.as_std_path())
            .sort_by_file_name()
            .into_iter()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if !self.config.is_archive_name(&file_name) {
                continue;
            }

            let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
                tracing::warn!("Skipping archive with non UTF-8 path");
                continue;
            };

            let mut archive = WadArchive::open(&path)?;
            self.attach_embedded_toc(&mut archive);
            archives.push(archive);
        }

        let mut lookup = HashMap::new();
        for (index, archive) in archives.iter().enumerate() {
            for (path_hash, _) in archive.entries() {
                lookup.entry(path_hash).or_insert(index);
            }
        }

        tracing::info!(
            "Indexed {} archives under {} ({} unique entries)",
            archives.len(),
            self.root,
            lookup.len()
        );
        self.archives = archives;
        self.lookup = lookup;
        Ok(())
    }

    /// Attach a sub-chunk table stored inside the archive itself, if there is one.
    fn attach_embedded_toc(&self, archive: &mut WadArchive) {
        if archive.subchunk_toc().is_some() {
            return;
        }

        let relative = archive
            .path()
            .strip_prefix(&self.root)
            .unwrap_or(archive.path());
        let Some(toc_name) = subchunk_toc_path(relative) else {
            return;
        };

        let toc_hash = hash_path(toc_name.as_str());
        if !archive.has_file(toc_hash) {
            return;
        }

        match archive
            .extract(toc_hash)
            .and_then(|bytes| SubChunkToc::parse(&bytes))
        {
            Ok(toc) => {
                tracing::debug!("Attached embedded sub-chunk table to {}", archive.path());
                archive.set_subchunk_toc(toc);
            }
            Err(e) => tracing::warn!("Failed to read sub-chunk table {}: {}", toc_name, e),
        }
    }

    fn queue(&mut self, resource: ResourceHandle, path_hash: u64, archive: usize) {
        tracing::trace!("Queued extraction of {}", resource.name());
        self.requests.push_back(ExtractRequest {
            resource,
            path_hash,
            archive,
        });
    }
}

impl Backend for WadBackend {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn index_state(&self) -> IndexState {
        self.index_state
    }

    fn index_files(&mut self, on_indexed: IndexCallback) -> IndexState {
        self.on_indexed = Some(on_indexed);
        self.index_state
    }

    fn exists(&self, path: &str) -> bool {
        self.lookup.contains_key(&hash_path(path))
    }

    fn resolve(&mut self, path: &str, invalidate: bool) -> Option<ResourceHandle> {
        let name = self.relative_path(path).to_lowercase();
        let path_hash = hash_path(&name);
        let archive = *self.lookup.get(&path_hash)?;

        if let Some(resource) = self.files.get(&name).cloned() {
            if invalidate {
                self.queue(resource.clone(), path_hash, archive);
            }
            return Some(resource);
        }

        let resource = Resource::create(name.clone(), self.root.clone(), None);
        self.files.insert(name, resource.clone());
        self.queue(resource.clone(), path_hash, archive);
        Some(resource)
    }

    fn has(&self, resource: &ResourceHandle) -> bool {
        self.files
            .get(resource.name())
            .is_some_and(|owned| Arc::ptr_eq(owned, resource))
    }

    fn set_flags(&mut self, _flags: MountFlags) {}

    fn update(&mut self, completions: &mut Completions) {
        if let Some(on_indexed) = self.on_indexed.take() {
            self.index_state = match self.index_now() {
                Ok(()) => IndexState::IsIndexed,
                Err(e) => {
                    tracing::warn!("Failed to index archives under {}: {}", self.root, e);
                    IndexState::FailedToIndex
                }
            };
            on_indexed(self.index_state);
        }

        let begin = Instant::now();
        while let Some(request) = self.requests.pop_front() {
            let archive = &self.archives[request.archive];
            let state = match archive.extract(request.path_hash) {
                Ok(data) => {
                    request.resource.set_data(data);
                    LoadState::Loaded
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to extract {} from {}: {}",
                        request.resource.name(),
                        archive.path(),
                        e
                    );
                    LoadState::FailedToLoad
                }
            };
            completions.load(request.resource, state);

            if begin.elapsed() >= self.config.tick_budget() {
                break;
            }
        }

        self.files.retain(|_, resource| {
            Arc::strong_count(resource) > 1 || !resource.load_state().is_concluded()
        });
    }

    fn is_ready_to_exit(&self) -> bool {
        true
    }
}
