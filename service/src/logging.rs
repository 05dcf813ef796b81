use crate::config::Config;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Transport and filesystem crates whose chatter drowns out the hub's own
/// connection logs. Only shown at Trace.
const FILTERED_MODULES: &[&str] = &[
    "tokio_tungstenite",
    "tungstenite",
    "tower",
    "tower_http",
    "hyper",
    "axum",
    "notify",
];

/// Terminal logger settings derived from the runtime configuration.
struct LogSettings {
    level: LevelFilter,
    filter_dependencies: bool,
    mode: TerminalMode,
    color: ColorChoice,
}

impl LogSettings {
    fn from_config(config: &Config) -> Self {
        let level = config.log_level_filter;

        // Production: uncolored, everything on stderr.
        let (mode, color) = if config.is_production() {
            (TerminalMode::Stderr, ColorChoice::Never)
        } else {
            (TerminalMode::Mixed, ColorChoice::Auto)
        };

        Self {
            level,
            filter_dependencies: level != LevelFilter::Trace,
            mode,
            color,
        }
    }

    fn log_config(&self) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if self.filter_dependencies {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger for the hub.
    ///
    /// Level comes from `log_level_filter`; output mode and colors follow the
    /// runtime environment.
    pub fn init_logger(config: &Config) {
        let settings = LogSettings::from_config(config);

        if let Err(e) = TermLogger::init(
            settings.level,
            settings.log_config(),
            settings.mode,
            settings.color,
        ) {
            eprintln!("Failed to start simplelog: {e}");
        }
    }
}
