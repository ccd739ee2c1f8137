//! Logging setup shared by the sr311 crates
//!
//! Events go to stderr through `emit_term`. The level comes from the
//! `SR311_LOG` environment variable unless the caller forces one:
//! - `SR311_LOG=off` (default) - no logs
//! - `SR311_LOG=info` - pagination progress and negotiation outcome
//! - `SR311_LOG=debug` - every request and every negotiation attempt

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "SR311_LOG";

static INIT: Once = Once::new();

/// Level requested by the user, or `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Parse a level name. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    fn emit_level(self) -> Option<emit::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(emit::Level::Error),
            LogLevel::Warn => Some(emit::Level::Warn),
            LogLevel::Info => Some(emit::Level::Info),
            LogLevel::Debug => Some(emit::Level::Debug),
        }
    }
}

/// Initialize diagnostics from `SR311_LOG`.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_diagnostics() {
    init_with_level(None);
}

/// Initialize diagnostics, letting `forced` win over the environment.
pub fn init_with_level(forced: Option<LogLevel>) {
    INIT.call_once(|| {
        let level = match forced {
            Some(level) => level,
            None => {
                let requested = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
                match LogLevel::parse(&requested) {
                    Some(level) => level,
                    None => {
                        // Bootstrap warning: the emitter is not running yet
                        eprintln!("Warning: Unknown {LOG_ENV} value '{requested}', using 'info'");
                        LogLevel::Info
                    }
                }
            }
        };

        let Some(min) = level.emit_level() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        // The runtime must live for the whole process
        std::mem::forget(rt);
    });
}

// The level macros are re-exported rather than wrapped in `macro_rules!`:
// a wrapper puts emit's template holes behind macro hygiene, so `{name}`
// could not capture the caller's local variables on stable Rust.

/// Operations a user running the tool wants to see.
///
/// Examples: "Negotiated server-side filter", "Fetched 4 pages"
pub use emit::info;

/// Per-request detail.
///
/// Examples: "Requesting page at offset 50000", "Probe rejected: type mismatch"
pub use emit::debug;

/// Fallbacks and ambiguous remote responses.
pub use emit::warn;

/// Failures that end the run.
pub use emit::error;

/// Re-export the init function for convenience
pub use init_diagnostics as init;
