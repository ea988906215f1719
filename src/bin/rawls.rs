//! rawls - long-format directory listing using raw syscalls

use chrono::{Local, TimeZone, Utc};
use clap::{CommandFactory, Parser};
use rawutils::config::{log_level, ListArgs, RuntimeConfig, LISTER_NAME};
use rawutils::core::{report, Lister};
use rawutils::fs::TimeReference;
use rawutils::mem::Arena;
use rawutils::sys::{terminate_process, RawStream};
use std::os::unix::ffi::OsStrExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = ListArgs::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose, false))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match RuntimeConfig::from_list_args(&args) {
        Ok(config) => config,
        Err(msg) => ListArgs::command()
            .error(clap::error::ErrorKind::InvalidValue, msg)
            .exit(),
    };

    let mut stderr = RawStream::stderr();
    let arena = match Arena::reserve(config.arena_capacity) {
        Ok(arena) => arena,
        Err(e) => {
            report(&mut stderr, LISTER_NAME, &e);
            terminate_process(1);
        }
    };

    let paths: Vec<&[u8]> = args.paths.iter().map(|p| p.as_os_str().as_bytes()).collect();

    // "now" is captured once at start-up; each row converts in its own offset
    let failures = if args.utc {
        list(arena, TimeReference::utc(Utc::now().timestamp()), &paths)
    } else {
        list(arena, TimeReference::new(Local::now().timestamp(), Local), &paths)
    };

    if failures > 0 {
        tracing::debug!("{} of {} paths failed", failures, paths.len());
        terminate_process(1);
    }
}

/// Run the lister over `paths`, returning how many failed
fn list<Tz: TimeZone>(arena: Arena, reference: TimeReference<Tz>, paths: &[&[u8]]) -> usize {
    let mut lister = Lister::new(arena, reference, RawStream::stdout(), RawStream::stderr());
    let failures = lister.list_all(paths);

    if let Err(e) = lister.finish() {
        report(&mut RawStream::stderr(), LISTER_NAME, &e);
        terminate_process(1);
    }

    failures
}
