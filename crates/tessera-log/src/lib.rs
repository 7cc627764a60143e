//! A minimal, zero-dependency logging crate for the tessera crates.
//!
//! Messages are written to stderr with the calling module path and a colored
//! level tag. The level is held in a global atomic, so the macros are cheap
//! to leave in hot paths: nothing is formatted unless the level is enabled.
//!
//! # Configuration
//!
//! The default level is [`Level::Warn`]. Binaries and tests can raise it
//! programmatically with [`set_level`], or from the environment with
//! [`init_from_env`], which reads the [`ENV_VAR`] variable
//! (`TESSERA_LOG=debug`).
//!
//! # Example
//!
//! ```
//! use tessera_log::{debug, error, info, warn, Level};
//!
//! tessera_log::set_level(Level::Debug);
//!
//! let pages = 3;
//! info!("arena holds {} pages", pages);
//! debug!("cursor at {:?}", (1, 64));
//! warn!("rollback ignored");
//! error!("out of memory");
//! ```

use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable consulted by [`init_from_env`].
pub const ENV_VAR: &str = "TESSERA_LOG";

/// Log levels ordered from most severe (`Error`) to least severe (`Trace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Unrecoverable conditions, logged right before the failure surfaces.
    Error = 0,
    /// Unexpected but tolerated situations.
    Warn = 1,
    /// Coarse lifecycle events.
    Info = 2,
    /// Allocation-level detail: page creation, table growth.
    Debug = 3,
    /// Per-operation detail.
    Trace = 4,
}

impl Level {
    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Returns the upper-case tag for this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {
    input: String,
}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {:?}", self.input)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring case and surrounding whitespace.
    ///
    /// ```
    /// use tessera_log::Level;
    ///
    /// assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
    /// assert_eq!(" WARN ".parse::<Level>(), Ok(Level::Warn));
    /// assert!("loud".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError {
                input: s.to_string(),
            }),
        }
    }
}

/// The global logger. Only the minimum level is mutable.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the minimum level; less severe messages are dropped.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns the current minimum level.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Checks if a message at `level` would be written.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Returns the global logger, created at [`Level::Warn`] on first use.
pub fn get_logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(Level::Warn))
}

/// Sets the minimum level of the global logger.
pub fn set_level(level: Level) {
    get_logger().set_level(level);
}

/// Parses `s` and applies it as the global level.
///
/// ```
/// tessera_log::set_level_from_str("trace").unwrap();
/// assert_eq!(tessera_log::get_logger().level(), tessera_log::Level::Trace);
/// ```
pub fn set_level_from_str(s: &str) -> Result<(), ParseLevelError> {
    set_level(s.parse()?);
    Ok(())
}

/// Applies the level named by the [`ENV_VAR`] environment variable.
///
/// Returns the applied level, `Ok(None)` when the variable is unset, or the
/// parse error when it holds something other than a level name. On error
/// the current level is left as is.
pub fn init_from_env() -> Result<Option<Level>, ParseLevelError> {
    apply_config(std::env::var(ENV_VAR).ok().as_deref())
}

fn apply_config(value: Option<&str>) -> Result<Option<Level>, ParseLevelError> {
    match value {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => {
            let level = raw.parse()?;
            set_level(level);
            Ok(Some(level))
        }
    }
}

#[doc(hidden)]
pub fn __log_with_target(level: Level, target: &str, args: Arguments) {
    static RESET: &str = "\x1b[0m";

    if !get_logger().enabled(level) {
        return;
    }

    let color = level.color_code();
    eprintln!("{color}[{level}]{RESET} {target}: {args}");
}

/// Logs a message at an explicit level, tagged with the caller's module path.
///
/// ```
/// use tessera_log::{log, Level};
///
/// log!(level: Level::Error, "page request of {} bytes refused", 4096);
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {
        {
            if $crate::get_logger().enabled($level) {
                $crate::__log_with_target(
                    $level,
                    module_path!(),
                    format_args!($($arg)*)
                );
            }
        }
    };
}

/// Logs a message at the Error level.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs a message at the Warn level.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs a message at the Info level.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs a message at the Debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs a message at the Trace level.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert_eq!("Warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("Info".parse::<Level>(), Ok(Level::Info));
        assert_eq!("DEBUG".parse::<Level>(), Ok(Level::Debug));
        assert_eq!(" trace\n".parse::<Level>(), Ok(Level::Trace));

        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err.to_string(), "invalid log level: \"verbose\"");
    }

    #[test]
    fn test_level_display_roundtrips_through_parse() {
        for level in [
            Level::Error,
            Level::Warn,
            Level::Info,
            Level::Debug,
            Level::Trace,
        ] {
            assert_eq!(level.to_string().parse::<Level>(), Ok(level));
            assert_eq!(Level::from_u8(level as u8), level);
        }
    }

    #[test]
    fn test_logger_level_filtering() {
        let logger = Logger::new(Level::Warn);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warn));
        assert!(!logger.enabled(Level::Info));

        logger.set_level(Level::Debug);
        assert_eq!(logger.level(), Level::Debug);
        assert!(logger.enabled(Level::Debug));
        assert!(!logger.enabled(Level::Trace));
    }

    // All mutation of the global level lives in this one test so parallel
    // test threads never observe each other's settings.
    #[test]
    fn test_global_configuration() {
        set_level(Level::Info);
        assert_eq!(get_logger().level(), Level::Info);

        set_level_from_str("debug").unwrap();
        assert_eq!(get_logger().level(), Level::Debug);
        assert!(set_level_from_str("nope").is_err());
        assert_eq!(get_logger().level(), Level::Debug);

        assert_eq!(apply_config(None), Ok(None));
        assert_eq!(apply_config(Some("  ")), Ok(None));
        assert_eq!(apply_config(Some("error")), Ok(Some(Level::Error)));
        assert_eq!(get_logger().level(), Level::Error);
        assert!(apply_config(Some("chatty")).is_err());
        assert_eq!(get_logger().level(), Level::Error);

        assert!(std::ptr::eq(get_logger(), get_logger()));

        set_level(Level::Trace);
        trace!("macro expansion at {}", "trace");
        debug!("macro expansion at {}", Level::Debug);
        set_level(Level::Warn);
    }
}
