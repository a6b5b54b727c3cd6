use std::env;

use log::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::{Config, LogFormat};

fn get_rust_log(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "",
        LevelFilter::Error => "ERROR",
        LevelFilter::Warn => "WARN",
        LevelFilter::Info => {
            "INFO,\
             hyper=WARN,\
             reqwest=WARN"
        }
        LevelFilter::Debug => {
            "INFO,\
             hyper=WARN,\
             reqwest=WARN,\
             picfall_service=DEBUG,\
             picfall_sources=DEBUG"
        }
        LevelFilter::Trace => {
            "INFO,\
             hyper=WARN,\
             reqwest=WARN,\
             picfall_service=TRACE,\
             picfall_sources=TRACE"
        }
    }
}

/// Initializes logging for the resolution layer.
///
/// This considers the `RUST_LOG` environment variable and defaults it to the level specified in
/// the configuration. Additionally, this toggles `RUST_BACKTRACE` based on the
/// [`enable_backtraces`](crate::config::Logging::enable_backtraces) config value.
pub fn init_logging(config: &Config) {
    if config.logging.enable_backtraces {
        env::set_var("RUST_BACKTRACE", "1");
    }

    let rust_log =
        env::var("RUST_LOG").unwrap_or_else(|_| get_rust_log(config.logging.level).to_string());

    let fmt_layer = {
        let layer = tracing_subscriber::fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_target(true);

        match (config.logging.format, console::user_attended()) {
            (LogFormat::Auto, true) | (LogFormat::Pretty, _) => layer.pretty().boxed(),
            (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
                layer.compact().with_ansi(false).boxed()
            }
        }
    }
    .with_filter(EnvFilter::new(&rust_log));

    tracing_subscriber::registry().with(fmt_layer).init();
}
