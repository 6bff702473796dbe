/// Process-wide logger setup
///
/// brushbox itself only talks to the `log` facade. Hosts that bring their own
/// logger skip this module; small tools and tests call `init_logging` once at
/// startup to get `env_logger` output.

use std::sync::Once;

use env_logger::WriteStyle;

/// Filter used when neither the config nor `RUST_LOG` names one
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. "brushbox=debug,rusqlite=warn".
    /// Takes precedence over `RUST_LOG`.
    pub filter: Option<String>,
    pub write_style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

static INIT: Once = Once::new();

/// Install the logger for this process.
///
/// Only the first call does anything; it returns whether brushbox's logger
/// was installed. `false` means an earlier call already ran, or the host had
/// installed a logger of its own.
pub fn init_logging(config: LoggingConfig) -> bool {
    let mut installed = false;

    INIT.call_once(|| {
        let filter = resolve_filter(config.filter.as_deref(), std::env::var("RUST_LOG").ok());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter).write_style(config.write_style);

        installed = builder.try_init().is_ok();
        if installed {
            log::debug!("📝 Logging with filter '{}'", filter);
        }
    });

    installed
}

/// Explicit filter, then the environment, then `DEFAULT_FILTER`
fn resolve_filter(explicit: Option<&str>, env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| env.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
