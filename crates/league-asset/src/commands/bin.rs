use crate::errors::CliError;
use crate::println_pad;
use camino::Utf8PathBuf;
use colored::Colorize;
use league_bin::{fnv1a, BinDocument};
use miette::{IntoDiagnostic, Result};

pub struct BinEntryArgs {
    pub file: Utf8PathBuf,
    pub entry: String,
}

/// Entry names are hashed, `0x`-prefixed hex is taken as the hash itself.
fn parse_entry(entry: &str) -> Result<u32, CliError> {
    match entry
        .strip_prefix("0x")
        .or_else(|| entry.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| CliError::InvalidHash {
            value: entry.to_string(),
        }),
        None => Ok(fnv1a(entry)),
    }
}

pub fn dump_bin_entry(args: BinEntryArgs) -> Result<()> {
    if !args.file.exists() {
        return Err(CliError::FileNotFound { path: args.file }.into());
    }

    let hash = parse_entry(&args.entry)?;
    let bytes = std::fs::read(&args.file).into_diagnostic()?;
    let document = BinDocument::parse(bytes).into_diagnostic()?;

    println_pad!(
        "{} {} {}",
        "📄 BIN:".bright_blue().bold(),
        args.file.as_str().bright_cyan().bold(),
        format!(
            "(version {}, {} entries)",
            document.version(),
            document.entry_count()
        )
        .dimmed()
    );
    for linked in document.linked_files() {
        println_pad!("   {} {}", "🔗".bright_cyan(), linked);
    }

    let value = document.find(hash).into_diagnostic()?;
    if value.is_empty() {
        return Err(CliError::EntryNotFound { entry: args.entry }.into());
    }

    println_pad!(
        "\n{} {:#010x}",
        "🧾 Entry".bright_magenta().bold(),
        hash
    );
    println_pad!("{:#?}", value);

    Ok(())
}
