//! Tree transfer engine shared by the `rsftp` tool.
//!
//! The engine moves a file or a directory tree between two [`fs::Filesystem`] endpoints. It never
//! talks to the network itself: the local side is [`local::LocalFs`], the remote side is supplied
//! by the caller.
//!
//! # Modules
//!
//! - [`fs`]: the capability every endpoint offers, plus its error taxonomy
//! - [`local`]: the local endpoint on top of `tokio::fs`
//! - [`path`]: pure path-string arithmetic and source to destination translation
//! - [`walk`]: enumeration of a source root in depth-first pre-order
//! - [`transfer`]: directory creation with parent recovery, chunked copies and the driver
//! - [`config`]: validated transfer settings and process-level settings
//! - [`progress`]: live counters read by the progress printer
//!
//! [`run`] wraps a binary's async entry point with logging, a tokio runtime and progress
//! reporting.

use std::sync::{Arc, Condvar, LazyLock, Mutex};

use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

pub mod config;
pub mod fs;
pub mod local;
pub mod path;
pub mod progress;
pub mod transfer;
pub mod walk;

#[cfg(test)]
pub mod testutils;

pub use config::{
    ConfigError, DEFAULT_CHUNK_SIZE, Direction, MAX_CHUNK_SIZE, OutputConfig, RuntimeConfig,
    TracingConfig, TransferConfig,
};
pub use fs::{DirCreate, Filesystem, Kind};
pub use local::LocalFs;
pub use transfer::{Summary, transfer};

static PROGRESS: LazyLock<progress::Progress> = LazyLock::new(progress::Progress::new);

pub fn get_progress() -> &'static progress::Progress {
    &PROGRESS
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// Progress bar when stderr is a terminal, text updates otherwise
    #[default]
    #[value(name = "Auto", alias = "auto")]
    Auto,
    /// Animated progress bar
    #[value(name = "ProgressBar", alias = "progress-bar")]
    ProgressBar,
    /// Periodic text reports, appropriate for logging
    #[value(name = "TextUpdates", alias = "text-updates")]
    TextUpdates,
}

#[derive(Clone, Debug, Default)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    /// Human readable delay between updates, e.g. "200ms" or "10s"
    pub progress_delay: Option<String>,
}

struct ProgressTracker {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressTracker {
    fn start(progress_type: ProgressType, delay: Option<std::time::Duration>) -> Self {
        let interactive = match progress_type {
            ProgressType::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
            ProgressType::ProgressBar => true,
            ProgressType::TextUpdates => false,
        };
        let delay = delay.unwrap_or(if interactive {
            std::time::Duration::from_millis(200)
        } else {
            std::time::Duration::from_secs(10)
        });
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            let mut printer = progress::ProgressPrinter::new(get_progress());
            let bar = interactive.then(|| {
                let bar = indicatif::ProgressBar::new_spinner();
                bar.enable_steady_tick(std::time::Duration::from_millis(120));
                bar
            });
            let (lock, cvar) = &*thread_stop;
            let mut stopped = match lock.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            loop {
                match &bar {
                    Some(bar) => bar.set_message(printer.print_line()),
                    None => eprintln!("{}", printer.print()),
                }
                if *stopped {
                    break;
                }
                stopped = match cvar.wait_timeout(stopped, delay) {
                    Ok((guard, _)) => guard,
                    Err(poisoned) => poisoned.into_inner().0,
                };
            }
            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.stop;
        match lock.lock() {
            Ok(mut stopped) => *stopped = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        cvar.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn setup_tracing(output: &OutputConfig, tracing_config: &TracingConfig) -> anyhow::Result<()> {
    let console_layer = (!output.quiet).then(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level(output.verbose)));
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
    });
    let file_layer = match &tracing_config.debug_log_file {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|error| {
                anyhow::anyhow!("cannot create debug log file {:?}: {}", path, error)
            })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(tracing_subscriber::EnvFilter::new("trace")),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Runs `func` on a fresh tokio runtime with logging and optional progress reporting set up.
///
/// Returns `None` on any failure (after reporting it unless `quiet` is set), so the caller can
/// exit with a non-zero status.
pub fn run<Fut, Summary, Error>(
    progress_settings: Option<ProgressSettings>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    tracing_config: TracingConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Error: std::fmt::Display,
    Fut: std::future::Future<Output = Result<Summary, Error>>,
{
    if let Err(error) = setup_tracing(&output, &tracing_config) {
        if !output.quiet {
            eprintln!("{error:#}");
        }
        return None;
    }
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!("failed to build the tokio runtime: {:#}", &error);
            if !output.quiet {
                eprintln!("failed to build the tokio runtime: {error:#}");
            }
            return None;
        }
    };
    let progress_tracker = match progress_settings {
        Some(settings) => {
            let delay = match settings.progress_delay.as_deref().map(humantime::parse_duration) {
                Some(Ok(delay)) => Some(delay),
                Some(Err(error)) => {
                    if !output.quiet {
                        eprintln!("invalid progress delay: {error}");
                    }
                    return None;
                }
                None => None,
            };
            Some(ProgressTracker::start(settings.progress_type, delay))
        }
        None => None,
    };
    let res = runtime.block_on(func());
    drop(progress_tracker);
    match res {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(log_level(0), "error");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(3), "trace");
        assert_eq!(log_level(9), "trace");
    }

    #[test]
    fn progress_type_accepts_both_spellings() {
        use clap::ValueEnum;
        assert_eq!(
            ProgressType::from_str("TextUpdates", false),
            Ok(ProgressType::TextUpdates)
        );
        assert_eq!(
            ProgressType::from_str("progress-bar", false),
            Ok(ProgressType::ProgressBar)
        );
        assert!(ProgressType::from_str("fancy", false).is_err());
    }
}
