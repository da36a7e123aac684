//! An injectable logging handle for readers.
//!
//! Readers emit their records through a [`Diagnostics`] value they own instead
//! of the global `log` macros, so a caller can route one reader's messages to a
//! dedicated [`log::Log`] implementation. The default handle forwards to
//! whatever logger the application installed with the `log` crate.
use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

/// Forwards every record to the process-wide logger from [`log::logger`]
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record)
    }

    fn flush(&self) {
        log::logger().flush()
    }
}

#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn Log>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Arc::new(GlobalLogger))
    }
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self { sink }
    }

    pub fn log(&self, level: Level, target: &str, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(target).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .args(args)
                .build(),
        );
    }

    /// A recoverable failure, such as a rejected layout candidate
    pub fn warn(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, target, args)
    }

    /// An optional value that was not found. Never used for failures.
    pub fn soft_miss(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Info, target, args)
    }

    pub fn debug(&self, target: &str, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, target, args)
    }
}
