use crate::document::{BinDocument, BinOptions};
use crate::error::{BinError, Result};
use league_vfs::{LoadFlags, LoadState, MountRegistry, ResourceHandle};

/// Load a BIN document through `registry`.
///
/// `callback` runs every time the backing resource concludes a load, including
/// later hot reloads, with a document parsed from the bytes of that load.
pub fn load<F>(registry: &MountRegistry, path: &str, callback: F) -> Option<ResourceHandle>
where
    F: Fn(Result<BinDocument>) + Send + Sync + 'static,
{
    load_with(registry, path, BinOptions::default(), callback)
}

pub fn load_with<F>(
    registry: &MountRegistry,
    path: &str,
    options: BinOptions,
    callback: F,
) -> Option<ResourceHandle>
where
    F: Fn(Result<BinDocument>) + Send + Sync + 'static,
{
    tracing::debug!("Loading BIN document {}", path);
    registry.load(path, LoadFlags::NONE, move |resource| {
        callback(parse_resource(resource, options));
    })
}

fn parse_resource(resource: &ResourceHandle, options: BinOptions) -> Result<BinDocument> {
    let state = resource.load_state();
    if state != LoadState::Loaded {
        return Err(BinError::NotLoaded(state));
    }

    BinDocument::parse_with(resource.data(), options).inspect_err(|err| {
        tracing::warn!("Failed to parse BIN document {}: {}", resource.full_name(), err);
    })
}
