//! Driver logging facility
//!
//! Routes the driver's `log` records to whatever console the host kernel
//! owns. The kernel registers a sink once; until then records are dropped.
//! Log levels are configured based on build configuration (debug/release).

use core::fmt::Arguments;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Output function the kernel supplies (serial port, framebuffer console...)
pub type LogSink = fn(Arguments<'_>);

/// Global logger instance available throughout the driver
pub static LOGGER: Logger = Logger::new();

/// Thread-safe logger implementation
pub struct Logger {
    sink: Mutex<Option<LogSink>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a logger with no sink attached
    pub const fn new() -> Logger {
        Logger {
            sink: Mutex::new(None),
        }
    }

    /// Replaces the sink records are forwarded to
    pub fn set_sink(&self, sink: LogSink) {
        *self.sink.lock() = Some(sink);
    }
}

impl Log for Logger {
    /// Determines if a log message should be processed based on its level
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats messages as "[LEVEL] target: message"
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let guard = self.sink.lock();
        if let Some(sink) = *guard {
            sink(format_args!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            ));
        }
    }

    /// Flush buffered logs (no-op in this implementation)
    fn flush(&self) {}
}

/// Initializes the logging system
///
/// # Notes
/// * Sets different log levels for debug/release builds:
///   - Debug builds: LevelFilter::Debug
///   - Release builds: LevelFilter::Info
/// * Fails if another logger was already installed; the sink is still
///   attached to [`LOGGER`] in that case.
pub fn init(sink: LogSink) -> Result<(), SetLoggerError> {
    LOGGER.set_sink(sink);
    log::set_logger(&LOGGER).map(|()| {
        log::set_max_level(
            #[cfg(debug_assertions)]
            LevelFilter::Debug,
            #[cfg(not(debug_assertions))]
            LevelFilter::Info,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use core::fmt::Write;

    static CAPTURED: Mutex<String> = Mutex::new(String::new());

    fn capture(args: Arguments<'_>) {
        let mut out = CAPTURED.lock();
        let _ = out.write_fmt(args);
        out.push('\n');
    }

    #[test]
    fn test_records_reach_sink() {
        let logger = Logger::new();
        logger.set_sink(capture);
        log::set_max_level(LevelFilter::Debug);

        logger.log(
            &Record::builder()
                .args(format_args!("mounted {} clusters", 42))
                .level(log::Level::Info)
                .target("fat16")
                .build(),
        );

        assert!(CAPTURED.lock().contains("[INFO] fat16: mounted 42 clusters"));
    }

    #[test]
    fn test_no_sink_drops_records() {
        let logger = Logger::new();
        logger.log(
            &Record::builder()
                .args(format_args!("nobody listens"))
                .level(log::Level::Error)
                .build(),
        );
        assert!(logger.sink.lock().is_none());
    }
}
