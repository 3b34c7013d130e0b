//! Tracing setup and the in-memory run log.
//!
//! Every event goes to the console (or, in silent mode, to a dated log
//! file) and also to a [`RunLog`], whose contents are mailed at the end of
//! a run.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{StockError, Result};

/// Append-only text buffer shared by every clone.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panic mid-write leaves at worst a partial line.
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writer handed out per event by [`RunLog`].
pub struct RunLogWriter(RunLog);

impl io::Write for RunLogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter(self.clone())
    }
}

/// Where console output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Stderr,
    /// Dated file under the log directory.
    File,
}

/// Name of the log file for today: `<YYYYMMDD>stocksync.log`.
pub fn log_file_name() -> String {
    format!("{}stocksync.log", chrono::Local::now().format("%Y%m%d"))
}

/// Install the global subscriber.
///
/// `level` is used unless `RUST_LOG` is set. The run log always receives
/// events without ANSI colors.
pub fn init(level: &str, sink: Sink, log_dir: &Path, run_log: &RunLog) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = (sink == Sink::Stderr)
        .then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));

    let file_layer = match sink {
        Sink::File => {
            std::fs::create_dir_all(log_dir).map_err(|e| StockError::io(log_dir, e))?;
            let file_appender = tracing_appender::rolling::never(log_dir, log_file_name());
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender),
            )
        }
        Sink::Stderr => None,
    };

    let run_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(run_log.clone());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(run_layer)
        .try_init()
        .map_err(|e| StockError::Config(format!("logging already initialised: {e}")))
}
