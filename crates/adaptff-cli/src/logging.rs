use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// Environment variable holding a filter directive that replaces the `-v`/`-q` level.
pub const LOG_ENV: &str = "ADAPTFF_LOG";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn build_filter(verbosity: u8, quiet: bool, directive: Option<&str>) -> Result<EnvFilter> {
    match directive {
        Some(directive) => EnvFilter::try_new(directive).map_err(|e| {
            CliError::Config(format!("Invalid {LOG_ENV} directive '{directive}': {e}"))
        }),
        None => Ok(EnvFilter::builder()
            .with_default_directive(level_filter(verbosity, quiet).into())
            .parse_lossy("")),
    }
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let directive = std::env::var(LOG_ENV).ok();
    let filter = build_filter(verbosity, quiet, directive.as_deref())?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry().with(filter).with(stderr_layer);

    let installed = if let Some(path) = log_file {
        let file = File::create(&path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| {
        CliError::Other(anyhow::anyhow!("Failed to install the global logger: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use std::thread;
    use std::time::Duration;
    use tracing::{debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!("This is an error");
        warn!(term = "amberdihedral", "Skipping quadruple");
        info!(geometries = 3, "Evaluating batch");
        debug!("This is debug");
        trace!("This is trace");
    }

    #[test]
    #[serial]
    fn second_initialization_reports_an_error() {
        ensure_global_logger_is_set();
        assert!(matches!(
            setup_logging(0, false, None),
            Err(CliError::Other(_))
        ));
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::ERROR);
    }

    #[test]
    fn environment_directive_replaces_verbosity() {
        let filter = build_filter(0, false, Some("adaptff=trace")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
        assert!(matches!(
            build_filter(0, false, Some("adaptff=[")),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn file_logging_can_be_added_to_global_logger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let file = File::create(log_path.clone()).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true);
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(keys = 12, "Collected parameter stub keys");
        });

        thread::sleep(Duration::from_millis(100));

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Collected parameter stub keys"));
        assert!(content.contains("keys=12"));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
