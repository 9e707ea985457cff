mod common;

use common::{init_logging, utf8_tempdir, WadFixture};
use league_vfs::{LoadFlags, LoadState, MountRegistry, ResourceHandle, SaveState, VfsConfig};
use league_wad::{hash_path, StorageKind, WadBackend, WadEntry};

fn config() -> VfsConfig {
    VfsConfig {
        tick_budget_ms: 50,
        ..Default::default()
    }
}

fn pump(registry: &MountRegistry, resource: &ResourceHandle) {
    for _ in 0..20 {
        if resource.load_state().is_concluded() {
            return;
        }
        registry.update();
    }
}

#[test]
fn test_mount_indexes_on_first_update() {
    init_logging();
    let (_dir, root) = utf8_tempdir();
    WadFixture::new()
        .raw("data/test.txt", b"hello")
        .write(&root, "Champions/Test.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root.clone(), config());

    // The companion directory mounts immediately, the archives on the first tick.
    assert_eq!(registry.mounted_count(), 1);
    assert_eq!(registry.pending_count(), 1);
    assert!(!registry.is_fully_mounted());

    registry.update();
    assert_eq!(registry.mounted_count(), 2);
    assert!(registry.is_fully_mounted());

    let resource = registry.resolve("DATA/Test.txt", LoadFlags::NONE).unwrap();
    assert_eq!(resource.name(), "data/test.txt");
    pump(&registry, &resource);

    assert_eq!(resource.load_state(), LoadState::Loaded);
    assert_eq!(&*resource.data(), b"hello");
    assert!(registry.is_valid(&resource));
}

#[test]
fn test_archive_files_resolve_through_companion_directory() {
    let (_dir, root) = utf8_tempdir();
    let path = WadFixture::new()
        .raw("data/test.txt", b"hello")
        .write(&root, "Test.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root.clone(), config());
    registry.update();

    let archive = registry
        .resolve("Test.wad.client", LoadFlags::NONE)
        .unwrap();
    pump(&registry, &archive);
    assert_eq!(archive.len() as u64, std::fs::metadata(&path).unwrap().len());

    // Both mounts are read-only.
    archive.save(None);
    assert_eq!(archive.save_state(), SaveState::NotSupported);
    assert!(registry
        .resolve("new.txt", LoadFlags::TRY_CREATE)
        .is_none());
}

#[test]
fn test_entries_are_shared_and_unknown_paths_miss() {
    let (_dir, root) = utf8_tempdir();
    WadFixture::new()
        .zstd("data/a.txt", "a".repeat(100).as_bytes())
        .write(&root, "a.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root, config());
    registry.update();

    let first = registry.resolve("data/a.txt", LoadFlags::NONE).unwrap();
    let second = registry.resolve("Data/A.txt", LoadFlags::NONE).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(registry.resolve("data/missing.txt", LoadFlags::NONE).is_none());

    pump(&registry, &first);
    assert_eq!(first.data_as_string(), "a".repeat(100));
}

#[test]
fn test_embedded_subchunk_toc() {
    let (_dir, root) = utf8_tempdir();
    let chunks = vec![vec![7u8; 300], b"tail".to_vec()];
    WadFixture::new()
        .multi("data/split.bin", chunks.clone())
        .embed_toc("data/final/split.wad.subchunktoc")
        .write(&root, "DATA/FINAL/Split.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root, config());
    registry.update();

    let resource = registry.resolve("data/split.bin", LoadFlags::NONE).unwrap();
    pump(&registry, &resource);
    assert_eq!(resource.load_state(), LoadState::Loaded);
    assert_eq!(resource.data().to_vec(), chunks.concat());
}

#[test]
fn test_extraction_failure_marks_resource() {
    let (_dir, root) = utf8_tempdir();
    let hash = hash_path("data/bad.bin");
    WadFixture::new()
        .entry(
            "data/bad.bin",
            b"garbage",
            WadEntry {
                path_hash: hash,
                compressed_size: 7,
                uncompressed_size: 100,
                type_tag: WadEntry::make_type_tag(StorageKind::Zstd, 0),
                ..Default::default()
            },
        )
        .write(&root, "bad.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root, config());
    registry.update();

    let states = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = states.clone();
    let resource = registry
        .load("data/bad.bin", LoadFlags::NONE, move |r| {
            sink.lock().unwrap().push(r.load_state());
        })
        .unwrap();
    pump(&registry, &resource);

    assert_eq!(resource.load_state(), LoadState::FailedToLoad);
    assert_eq!(*states.lock().unwrap(), vec![LoadState::FailedToLoad]);
}

#[test]
fn test_malformed_archive_fails_indexing() {
    let (_dir, root) = utf8_tempdir();
    WadFixture::new()
        .raw("data/ok.txt", b"ok")
        .write(&root, "good.wad.client");
    std::fs::write(root.join("broken.wad.client"), b"RW\x02\x00").unwrap();

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, root, config());
    registry.update();

    assert_eq!(registry.failed_count(), 1);
    assert_eq!(registry.pending_count(), 0);
    // Only the companion directory is usable.
    assert_eq!(registry.mounted_count(), 1);
    assert!(registry.resolve("data/ok.txt", LoadFlags::NONE).is_none());
}

#[test]
fn test_later_mount_shadows_archive() {
    let (_base_dir, base) = utf8_tempdir();
    let (_patch_dir, patch) = utf8_tempdir();
    WadFixture::new()
        .raw("data/test.txt", b"base")
        .write(&base, "base.wad.client");
    WadFixture::new()
        .raw("data/test.txt", b"patch")
        .write(&patch, "patch.wad.client");

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, base, config());
    WadBackend::mount(&registry, patch, config());
    registry.update();
    assert!(registry.is_fully_mounted());

    let resource = registry.resolve("data/test.txt", LoadFlags::NONE).unwrap();
    pump(&registry, &resource);
    assert_eq!(resource.data_as_string(), "patch");
}
