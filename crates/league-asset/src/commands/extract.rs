use crate::errors::CliError;
use crate::println_pad;
use crate::utils::format_size;
use camino::Utf8PathBuf;
use colored::Colorize;
use league_vfs::{LoadFlags, LoadState, MountRegistry, VfsConfig};
use league_wad::WadBackend;
use miette::{IntoDiagnostic, Result};

/// Upper bound on registry ticks spent waiting for indexing or extraction.
const MAX_TICKS: usize = 10_000;

pub struct ExtractAssetArgs {
    pub root: Utf8PathBuf,
    pub path: String,
    pub output: Utf8PathBuf,
    pub config: Option<Utf8PathBuf>,
}

pub fn extract_asset(args: ExtractAssetArgs) -> Result<()> {
    if !args.root.is_dir() {
        return Err(CliError::FileNotFound { path: args.root }.into());
    }

    let config = match &args.config {
        Some(path) => VfsConfig::load(path).into_diagnostic()?,
        None => VfsConfig::default(),
    };

    let registry = MountRegistry::new();
    WadBackend::mount(&registry, args.root.clone(), config);
    for _ in 0..MAX_TICKS {
        if registry.pending_count() == 0 {
            break;
        }
        registry.update();
    }
    if registry.failed_count() > 0 {
        tracing::warn!("{} backend(s) failed to index", registry.failed_count());
    }

    let resource = registry
        .resolve(&args.path, LoadFlags::NONE)
        .ok_or_else(|| CliError::AssetNotFound {
            path: args.path.clone(),
        })?;

    for _ in 0..MAX_TICKS {
        if resource.load_state().is_concluded() {
            break;
        }
        registry.update();
    }

    match resource.load_state() {
        LoadState::Loaded => {}
        LoadState::NotLoaded => return Err(CliError::LoadTimedOut { path: args.path }.into()),
        state => {
            return Err(CliError::AssetUnavailable {
                path: args.path,
                state,
            }
            .into())
        }
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent).into_diagnostic()?;
        }
    }
    let data = resource.data();
    std::fs::write(&args.output, &data[..]).into_diagnostic()?;

    println_pad!(
        "{} {} {} {}",
        "✅ Extracted".bright_green().bold(),
        resource.full_name().as_str().bright_cyan(),
        format!("({})", format_size(data.len() as u64)).dimmed(),
        format!("to {}", args.output).bright_white()
    );

    Ok(())
}
