use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arclist")]
#[command(version)]
#[command(about = "Decode nested payload/listing archives and text resources", long_about = None)]
#[command(after_help = "Examples:\n  \
  arclist list data.pak data.idx -v          list every node verbosely\n  \
  arclist list data.pak data.idx --nested-prefix sub/   walk nested listings too\n  \
  arclist extract data.pak data.idx '*.txt' -d out    extract matching leaves\n  \
  arclist text strings.bin                    print decoded lines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the archive tree and list every decoded node
    List(ListArgs),
    /// Extract leaf entries of the root listing
    Extract(ExtractArgs),
    /// Decode a compressed text resource
    Text(TextArgs),
}

/// Payload/listing file pair
#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Payload file
    #[arg(value_name = "PAYLOAD")]
    pub payload: PathBuf,

    /// Listing file
    #[arg(value_name = "LISTING")]
    pub listing: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Decode tasks in flight (default: available parallelism)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Treat entries with this name prefix as nested listings
    #[arg(long = "nested-prefix", value_name = "P")]
    pub nested_prefix: Option<String>,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n', conflicts_with = "overwrite")]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,
}

#[derive(Args, Debug)]
pub struct TextArgs {
    /// Text resource file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Encoding of the unpacked lines
    #[arg(long, value_enum, default_value_t = TextEncoding::Cp1252)]
    pub encoding: TextEncoding,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Cp1252,
    Utf8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || matches!(&self.command, Command::Extract(args) if args.pipe)
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default tracing directive when `RUST_LOG` is unset
    pub fn log_directive(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else if matches!(&self.command, Command::List(args) if args.verbose) {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_flags() {
        let cli = Cli::parse_from([
            "arclist",
            "list",
            "a.pak",
            "a.idx",
            "-j",
            "3",
            "--nested-prefix",
            "sub/",
            "-v",
        ]);
        let Command::List(args) = &cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.jobs, Some(3));
        assert_eq!(args.nested_prefix.as_deref(), Some("sub/"));
        assert_eq!(cli.log_directive(), "debug");
    }

    #[test]
    fn pipe_is_quiet() {
        let cli = Cli::parse_from(["arclist", "extract", "a.pak", "a.idx", "-p"]);
        assert!(cli.is_quiet());
        assert_eq!(cli.log_directive(), "warn");

        let cli = Cli::parse_from(["arclist", "-qq", "text", "s.bin", "--encoding", "utf8"]);
        assert!(cli.is_very_quiet());
    }

    #[test]
    fn overwrite_flags_conflict() {
        assert!(Cli::try_parse_from(["arclist", "extract", "a", "b", "-n", "-o"]).is_err());
    }
}
