use std::io::{self, BufRead, Write};
use std::path::Path;

use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use brute_core::cache;
use brute_core::commands::{self, backup::DEFAULT_RETRY_BACKOFF, ls::ArchiveListing};
use brute_core::config;
use brute_core::storage;

#[derive(Parser)]
#[command(
    name = "brute",
    version,
    about = "Encrypted, chunked, streaming backups to S3-compatible storage",
    after_help = "\
Configuration file lookup order:
  1. --config <path>        (explicit flag)
  2. ./backup.yaml          (working directory)
  3. /etc/backup.yaml       (system)
  4. $HOME/backup.yaml      (home)
  5. User config dir backup.yaml (e.g. ~/.config/backup.yaml)

When several mode flags are set, precedence is ls > size > rm > backup > restore."
)]
struct Cli {
    /// Back up the configured include directories to a new archive
    #[arg(long)]
    backup: bool,

    /// Restore the most recent archive
    #[arg(long)]
    restore: bool,

    /// Sum the local size of everything a backup would include
    #[arg(long)]
    size: bool,

    /// List archives with their total sizes
    #[arg(long)]
    ls: bool,

    /// Interactively delete archives
    #[arg(long)]
    rm: bool,

    /// Print the resolved configuration and exit
    #[arg(long = "show-config")]
    show_config: bool,

    /// Path to configuration file (overrides the default search)
    #[arg(short, long)]
    config: Option<String>,

    /// Destination directory for --restore
    #[arg(long, default_value = "/")]
    dest: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Some(config_path) = config::resolve_config_path(cli.config.as_deref()) else {
        eprintln!("No configuration file found. Searched:");
        for path in config::default_search_paths() {
            eprintln!("  {}", path.display());
        }
        return Err("missing configuration file".into());
    };
    tracing::info!(path = %config_path.display(), "using config");

    let mut cfg = config::load(&config_path)?;
    config::ensure_keypair(&mut cfg, &config_path)?;
    let settings = cfg.settings()?;

    if cli.show_config {
        print!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    let cache_path = Path::new(cache::DEFAULT_CACHE_PATH);

    if cli.ls {
        let store = storage::store_from_config(&cfg)?;
        let listings = commands::ls::run(&store, cache_path)?;
        if listings.is_empty() {
            println!("No archives found.");
        } else {
            println!("{}", archive_table(&listings));
        }
    } else if cli.size {
        let total = commands::size::run(&cfg)?;
        println!("Total backup size: {}", format_bytes(total));
    } else if cli.rm {
        let store = storage::store_from_config(&cfg)?;
        let listings = commands::ls::run(&store, cache_path)?;
        if listings.is_empty() {
            println!("No archives found.");
            return Ok(());
        }
        println!("{}", archive_table(&listings));

        print!("\nChoose which archives to delete (comma separated numbers): ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;

        let selection = commands::rm::parse_selection(&line, listings.len())?;
        if selection.is_empty() {
            println!("Nothing selected.");
            return Ok(());
        }
        let stamps: Vec<_> = listings.into_iter().map(|l| l.stamp).collect();
        let report = commands::rm::run(&store, &stamps, &selection)?;
        println!(
            "Deleted {} objects ({} failures)",
            report.objects_deleted, report.objects_failed
        );
    } else if cli.backup {
        let store = storage::store_from_config(&cfg)?;
        let report = commands::backup::run(&store, &cfg, &settings, DEFAULT_RETRY_BACKOFF)?;
        println!(
            "Archive {}: {} files, {} chunks, {} uploaded",
            report.archive,
            report.files,
            report.chunks,
            format_bytes(report.uploaded_bytes),
        );
    } else if cli.restore {
        let store = storage::store_from_config(&cfg)?;
        let report = commands::restore::run(
            &store,
            &cfg,
            &settings,
            DEFAULT_RETRY_BACKOFF,
            Path::new(&cli.dest),
        )?;
        println!(
            "Restored archive {}: {} files, {}",
            report.archive,
            report.files,
            format_bytes(report.bytes),
        );
    } else {
        eprintln!("No mode selected. Use --backup, --restore, --size, --ls, --rm, or --show-config.");
        std::process::exit(2);
    }

    Ok(())
}

fn archive_table(listings: &[ArchiveListing]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["#", "Archive", "Size"]);
    for (i, listing) in listings.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            listing.stamp.time.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_bytes(listing.size),
        ]);
    }
    table
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
