use crate::errors::CliError;
use crate::println_pad;
use crate::utils::format_size;
use camino::Utf8PathBuf;
use colored::Colorize;
use league_wad::WadArchive;
use miette::{IntoDiagnostic, Result};

pub struct WadInfoArgs {
    pub file: Utf8PathBuf,
    pub entries: bool,
}

pub fn wad_info(args: WadInfoArgs) -> Result<()> {
    if !args.file.exists() {
        return Err(CliError::FileNotFound { path: args.file }.into());
    }

    let archive = WadArchive::open(&args.file).into_diagnostic()?;
    let (major, minor) = archive.version();

    let mut entries: Vec<_> = archive.entries().collect();
    entries.sort_by_key(|(_, entry)| entry.offset);
    let total: u64 = entries
        .iter()
        .map(|(_, entry)| entry.uncompressed_size as u64)
        .sum();

    println_pad!(
        "{} {}",
        "📦 Archive:".bright_blue().bold(),
        archive.file_name().unwrap_or(args.file.as_str()).bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "🏷️ Version:".bright_green(),
        format!("{}.{}", major, minor).bright_white().bold()
    );
    println_pad!(
        "{} {:#018x}",
        "🔑 Checksum:".bright_yellow(),
        archive.checksum()
    );
    println_pad!(
        "{} {} ({} uncompressed)",
        "🗂️ Entries:".bright_magenta(),
        archive.len().to_string().bright_white().bold(),
        format_size(total)
    );
    if let Some(toc) = archive.subchunk_toc() {
        println_pad!("{} {}", "🧩 Sub-chunks:".bright_magenta(), toc.len());
    }

    if !args.entries {
        return Ok(());
    }

    println!();
    for (hash, entry) in entries {
        let duplicate = if entry.is_duplicate() {
            " (duplicate)".dimmed().to_string()
        } else {
            String::new()
        };
        println_pad!(
            "   {} {:016x} {:<12} {:>10} -> {:>10}{}",
            "•".bright_cyan(),
            hash,
            format!("{:?}", entry.storage()),
            format_size(entry.compressed_size as u64),
            format_size(entry.uncompressed_size as u64),
            duplicate
        );
    }

    Ok(())
}
