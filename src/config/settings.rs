//! Configuration settings for RawUtils
//!
//! Defines the CLI arguments of both tools and the runtime settings
//! derived from them.

use crate::mem::DEFAULT_ARENA_CAPACITY;
use clap::Parser;
use std::path::PathBuf;

/// Name the copier reports diagnostics under
pub const COPIER_NAME: &str = "rawcp";
/// Name the lister reports diagnostics under
pub const LISTER_NAME: &str = "rawls";

/// Environment variable overriding the arena size of either tool
pub const ARENA_SIZE_ENV: &str = "RAWUTILS_ARENA_SIZE";

/// Default streaming chunk for file copies (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// rawcp - copy a file or directory tree into a directory using raw syscalls
#[derive(Parser, Debug, Clone)]
#[command(name = "rawcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy a file or directory tree into a directory using raw syscalls")]
#[command(long_about = r#"
rawcp copies SOURCE into the directory DESTINATION, creating DESTINATION
if it does not exist. Directory sources are copied recursively; file
sources land in DESTINATION under their base name. File contents and
permission bits are preserved.

Examples:
  rawcp notes.txt backup/          # backup/notes.txt
  rawcp project/ project.bak       # project.bak/<everything in project>
"#)]
pub struct CopyArgs {
    /// File or directory to copy
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory to copy into (created if missing)
    #[arg(value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Streaming chunk size (e.g. 64K, 1M)
    #[arg(long, default_value = "64K", value_name = "SIZE")]
    pub chunk_size: String,

    /// Scratch arena size (e.g. 256M)
    #[arg(long, default_value = "256M", value_name = "SIZE", env = ARENA_SIZE_ENV)]
    pub arena_size: String,

    /// Verbose output (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// rawls - long-format directory listing using raw syscalls
#[derive(Parser, Debug, Clone)]
#[command(name = "rawls")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Long-format directory listing using raw syscalls")]
pub struct ListArgs {
    /// Files or directories to list
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Scratch arena size, reclaimed between arguments (e.g. 256M)
    #[arg(long, default_value = "256M", value_name = "SIZE", env = ARENA_SIZE_ENV)]
    pub arena_size: String,

    /// Show modification times in UTC instead of local time
    #[arg(long)]
    pub utc: bool,

    /// Verbose output (-v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Runtime settings shared by both tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bytes mapped for the scratch arena
    pub arena_capacity: usize,
    /// Bytes moved per read/write round trip
    pub chunk_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Create configuration from copier arguments
    pub fn from_copy_args(args: &CopyArgs) -> Result<Self, String> {
        let chunk_size = parse_size(&args.chunk_size).map_err(|e| format!("Invalid chunk size: {}", e))?;
        if chunk_size == 0 {
            return Err("Invalid chunk size: must be at least one byte".to_string());
        }

        Ok(Self {
            arena_capacity: parse_arena_size(&args.arena_size)?,
            chunk_size: chunk_size as usize,
        })
    }

    /// Create configuration from lister arguments
    pub fn from_list_args(args: &ListArgs) -> Result<Self, String> {
        Ok(Self {
            arena_capacity: parse_arena_size(&args.arena_size)?,
            ..Default::default()
        })
    }
}

fn parse_arena_size(size: &str) -> Result<usize, String> {
    let bytes = parse_size(size).map_err(|e| format!("Invalid arena size: {}", e))?;
    usize::try_from(bytes).map_err(|_| format!("Invalid arena size: {} does not fit in memory", size))
}

/// Default log filter for a `-v` count
pub fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Parse size string (e.g., "1M", "64K", "1.5G")
pub fn parse_size(size: &str) -> Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("TB") || size.ends_with("TIB") || size.ends_with('T') {
        (size.trim_end_matches(['T', 'I', 'B']), 1024u64 * 1024 * 1024 * 1024)
    } else if size.ends_with("GB") || size.ends_with("GIB") || size.ends_with('G') {
        (size.trim_end_matches(['G', 'I', 'B']), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with("MIB") || size.ends_with('M') {
        (size.trim_end_matches(['M', 'I', 'B']), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with("KIB") || size.ends_with('K') {
        (size.trim_end_matches(['K', 'I', 'B']), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid number: {}", num_str));
    }

    Ok((num * multiplier as f64) as u64)
}
