//! Main entry point for the arclist CLI application.
//!
//! Lists nested archive trees, extracts leaf entries and decodes text
//! resources.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use arclist::archive::{ListingParser, ZlibDecompressor};
use arclist::cli::{ArchiveArgs, Command, ExtractArgs, ListArgs, TextArgs, TextEncoding};
use arclist::text::{Cp1252, LineEncoding, Utf8Lossy};
use arclist::{
    Accessor, ArchiveExtractor, CancelFlag, Cli, DecoderConfig, DirectoryEntry, ListingDecoder,
    NamePrefix, TextResource, ViewCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::List(args) => list(args).await,
        Command::Extract(args) => extract(args, cli.is_quiet()).await,
        Command::Text(args) => text(args),
    }
}

fn open_root(cache: &Arc<ViewCache>, args: &ArchiveArgs) -> Result<Accessor> {
    Accessor::open(cache, &args.payload, &args.listing).with_context(|| {
        format!(
            "opening {} / {}",
            args.payload.display(),
            args.listing.display()
        )
    })
}

/// Walk the whole tree and print every decoded listing.
///
/// Listings are printed archives first, deepest level first, then by name.
async fn list(args: &ListArgs) -> Result<()> {
    let cache = ViewCache::new();
    let root = open_root(&cache, &args.archive)?;

    let mut config = DecoderConfig::default();
    if let Some(jobs) = args.jobs {
        config.concurrency = jobs.max(1);
    }
    if let Some(prefix) = &args.nested_prefix {
        config.nested = Some(Arc::new(NamePrefix(prefix.clone())));
    }

    let mut report = ListingDecoder::new(config).decode(root).await;
    report
        .listings
        .sort_by(|a, b| a.kind().cmp(&b.kind()).then_with(|| a.name().cmp(b.name())));

    for listing in &report.listings {
        println!("{} (level {}):", listing.name(), listing.accessor.level());
        if args.verbose {
            print_entries(&listing.entries);
        } else {
            for entry in &listing.entries {
                println!("  {}", entry.name);
            }
        }
    }

    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    if !report.is_complete() {
        bail!("{} listing(s) failed to decode", report.failures.len());
    }

    Ok(())
}

fn print_entries(entries: &[DirectoryEntry]) {
    println!(
        "{:>10}  {:>10}  {:>10}  {:>5}  Name",
        "Sector", "Length", "Size", "Cmpr"
    );
    println!("{}", "-".repeat(60));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;

    for entry in entries {
        println!(
            "{:>10}  {:>10}  {:>10}  {}  {}",
            entry.sector,
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            entry.name
        );
        total_uncompressed += entry.uncompressed_size;
        total_compressed += entry.compressed_size;
    }

    println!("{}", "-".repeat(60));
    println!(
        "{:>10}  {:>10}  {:>10}  {}  {} files, {}",
        "",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        entries.len(),
        format_size(total_uncompressed)
    );
}

/// Percentage saved by compression
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100u64.saturating_sub(compressed.saturating_mul(100) / uncompressed)
        )
    } else {
        "  0%".to_string()
    }
}

/// Decode the root listing and extract the selected leaves.
async fn extract(args: &ExtractArgs, quiet: bool) -> Result<()> {
    let cache = ViewCache::new();
    let root = open_root(&cache, &args.archive)?;

    let decompressor = ZlibDecompressor;
    let cancel = CancelFlag::default();
    let listing = ListingParser::new(&decompressor, &cancel)
        .parse(&root)
        .with_context(|| format!("decoding listing {}", args.archive.listing.display()))?;

    let selected: Vec<_> = listing
        .entries
        .iter()
        .filter(|e| is_selected(args, &e.name))
        .collect();

    let extractor = ArchiveExtractor::new(root);
    let multiple_files = args.pipe && selected.len() > 1;
    for entry in selected {
        extract_entry(&extractor, entry, args, quiet, multiple_files)
            .await
            .with_context(|| format!("extracting {}", entry.name))?;
    }

    Ok(())
}

fn is_selected(args: &ExtractArgs, name: &str) -> bool {
    if !args.files.is_empty() {
        let matches = args.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, name)
            } else {
                name == f || base_name(name) == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !args
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, name))
}

async fn extract_entry(
    extractor: &ArchiveExtractor,
    entry: &DirectoryEntry,
    args: &ExtractArgs,
    quiet: bool,
    show_filename: bool,
) -> Result<()> {
    if args.pipe {
        if show_filename {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", entry.name).as_bytes())
                .await?;
        }
        extractor.extract_to_stdout(entry).await?;
        return Ok(());
    }

    let file_name = if args.junk_paths {
        base_name(&entry.name)
    } else {
        entry.name.clone()
    };
    let Some(relative) = relative_path(&file_name) else {
        if !quiet {
            eprintln!("Skipping: {} (unsafe path)", entry.name);
        }
        return Ok(());
    };
    let output_path = match &args.extract_dir {
        Some(dir) => dir.join(relative),
        None => relative,
    };

    if output_path.exists() {
        if args.never_overwrite {
            if !quiet {
                eprintln!("Skipping: {} (file exists)", entry.name);
            }
            return Ok(());
        }
        if !args.overwrite {
            if !quiet {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name);
            }
            return Ok(());
        }
    }

    if !quiet {
        println!("  extracting: {}", entry.name);
    }
    extractor.extract_to_file(entry, &output_path).await?;

    Ok(())
}

/// Decode a text resource and print each line with its index.
fn text(args: &TextArgs) -> Result<()> {
    let file =
        File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;

    let encoding: &dyn LineEncoding = match args.encoding {
        TextEncoding::Cp1252 => &Cp1252,
        TextEncoding::Utf8 => &Utf8Lossy,
    };
    let resource = TextResource::read(BufReader::new(file), encoding)
        .with_context(|| format!("decoding text resource {}", args.file.display()))?;

    for (index, line) in resource.lines.iter().enumerate() {
        println!("{index}\t{line}");
    }

    Ok(())
}

fn base_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Output path for an archive entry name, kept inside the extraction
/// directory.
///
/// Leading roots and prefixes are stripped; names that climb with `..` or
/// are left empty yield `None`.
fn relative_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => return None,
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Glob matching with `*` (any run) and `?` (any one character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Human-readable byte size
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
