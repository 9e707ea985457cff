use camino::Utf8PathBuf;
use league_vfs::LoadState;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },

    #[error("No mounted archive contains {path}")]
    #[diagnostic(
        code(asset::not_found),
        help("Asset paths are relative to the game directory, e.g. data/characters/aatrox/aatrox.bin")
    )]
    AssetNotFound { path: String },

    #[error("{path} is {state}")]
    #[diagnostic(code(asset::unavailable))]
    AssetUnavailable { path: String, state: LoadState },

    #[error("Timed out waiting for {path}")]
    #[diagnostic(
        code(asset::timed_out),
        help("Raise tick_budget_ms in the storage config to give each tick more time")
    )]
    LoadTimedOut { path: String },

    #[error("Invalid entry hash: {value}")]
    #[diagnostic(
        code(bin::invalid_hash),
        help("Hashes are written as 0x followed by up to eight hex digits")
    )]
    InvalidHash { value: String },

    #[error("Entry {entry} not found")]
    #[diagnostic(code(bin::entry_not_found))]
    EntryNotFound { entry: String },
}
