//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise `-v` flags pick the level. While the
//! TUI owns the terminal, logs go to a file so they never land on the
//! alternate screen.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// `<data dir>/waste-report/waste-report.log`, if the platform has one.
pub fn default_log_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("waste-report").join("waste-report.log"))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbosity: u8, target: &LogTarget) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let installed = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    if let Err(e) = installed {
        // Already installed (tests, or a second init); keep the first one.
        eprintln!("logging already initialised: {}", e);
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create log directory {}: {}", parent.display(), e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))
}
