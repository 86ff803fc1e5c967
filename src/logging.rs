/*!
 * Process logger: coloured, timestamped lines on stderr.
 */

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

/// Logger writing one coloured line per record to stderr
struct SubflowLogger {
    level: LevelFilter,
}

impl SubflowLogger {
    // @returns: ANSI colour and short tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for SubflowLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let line = format_line(&now.to_string(), record.level(), &record.args().to_string());
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the global logger.
///
/// Fails if a logger is already installed; callers that may initialise
/// twice can ignore the error.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(SubflowLogger { level }))?;
    log::set_max_level(level);
    Ok(())
}

fn format_line(timestamp: &str, level: Level, message: &str) -> String {
    let (colour, tag) = SubflowLogger::style_for_level(level);
    format!("{}{} {} {}\x1B[0m", colour, timestamp, tag, message)
}
