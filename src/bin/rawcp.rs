//! rawcp - copy a file or directory tree into a directory using raw syscalls

use clap::{CommandFactory, Parser};
use rawutils::config::{log_level, CopyArgs, RuntimeConfig, COPIER_NAME};
use rawutils::core::{report, simple_copy};
use rawutils::error::Result;
use rawutils::sys::{terminate_process, RawStream};
use std::os::unix::ffi::OsStrExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CopyArgs::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose, args.quiet))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match RuntimeConfig::from_copy_args(&args) {
        Ok(config) => config,
        Err(msg) => CopyArgs::command()
            .error(clap::error::ErrorKind::InvalidValue, msg)
            .exit(),
    };

    if let Err(e) = run(&args, &config) {
        report(&mut RawStream::stderr(), COPIER_NAME, &e);
        terminate_process(1);
    }
}

fn run(args: &CopyArgs, config: &RuntimeConfig) -> Result<()> {
    tracing::debug!(
        "Copying {:?} -> {:?} (chunk {}, arena {})",
        args.source,
        args.destination,
        humansize::format_size(config.chunk_size as u64, humansize::BINARY),
        humansize::format_size(config.arena_capacity as u64, humansize::BINARY)
    );

    let stats = simple_copy(
        args.source.as_os_str().as_bytes(),
        args.destination.as_os_str().as_bytes(),
        config,
    )?;

    tracing::info!(
        "{} files, {} directories created, {} skipped, {}",
        stats.files_copied,
        stats.dirs_created,
        stats.skipped,
        humansize::format_size(stats.bytes_copied, humansize::BINARY)
    );

    Ok(())
}
