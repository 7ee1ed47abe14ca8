#![forbid(unsafe_code)]

//! Logging support.
//!
//! Library code logs through `tracing` macros and never installs a
//! subscriber. Applications and test binaries that want output call
//! [`try_init`] (feature `logging`), which reads:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `DBUI_LOG` | `EnvFilter` directives, default `warn` |
//! | `DBUI_LOG_FORMAT` | `json` for JSON lines, anything else for text |

pub use tracing::{debug, debug_span, error, info, info_span, trace, trace_span, warn};

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "DBUI_LOG";

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "DBUI_LOG_FORMAT";

/// Output format for [`try_init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read the format from `DBUI_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Install a global subscriber configured from the environment.
///
/// Returns `false` if a subscriber was already installed.
#[cfg(feature = "logging")]
pub fn try_init() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr);
    match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    }
}
