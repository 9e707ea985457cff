use camino::Utf8PathBuf;
use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    dump_bin_entry, extract_asset, wad_info, BinEntryArgs, ExtractAssetArgs, WadInfoArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the header and entry table of a WAD archive
    WadInfo {
        /// The path to the archive
        #[arg(short, long)]
        file: Utf8PathBuf,

        /// Print every entry, not just the summary
        #[arg(short, long, default_value_t = false)]
        entries: bool,
    },
    /// Extract one asset from the archives under a game directory
    Extract {
        /// The directory to mount; every archive below it is indexed
        #[arg(short, long)]
        root: Utf8PathBuf,

        /// The asset path to extract, e.g. data/characters/aatrox/aatrox.bin
        #[arg(short, long)]
        path: String,

        /// Where to write the extracted bytes
        #[arg(short, long)]
        output: Utf8PathBuf,

        /// Optional TOML file with storage tunables
        #[arg(short, long)]
        config: Option<Utf8PathBuf>,
    },
    /// Decode one entry of a BIN property file
    Bin {
        /// The path to the BIN file
        #[arg(short, long)]
        file: Utf8PathBuf,

        /// Entry name, or its hash written as 0x-prefixed hex
        #[arg(short, long)]
        entry: String,
    },
}

fn parse_args() -> Result<Args> {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).map_err(|e| miette::miette!("{}", e))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "league_asset=info,league_vfs=info,league_wad=info,league_bin=info".into()
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let args = parse_args()?;

    match args.command {
        Commands::WadInfo { file, entries } => wad_info(WadInfoArgs { file, entries }),
        Commands::Extract {
            root,
            path,
            output,
            config,
        } => extract_asset(ExtractAssetArgs {
            root,
            path,
            output,
            config,
        }),
        Commands::Bin { file, entry } => dump_bin_entry(BinEntryArgs { file, entry }),
    }
}
