use crate::error::ConfigError;
use crate::settings::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_FILE_PREFIX: &str = "sqlgate.log";

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. When a log directory is set the
/// returned guard must be held for the life of the process, otherwise buffered
/// lines are lost on exit.
pub fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    let (writer, guard, ansi) = match &settings.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), None, true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    tracing::debug!(
        json = settings.json,
        directory = ?settings.directory,
        "Tracing initialised."
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn file_logging_returns_a_guard_and_writes_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            filter: "debug".to_string(),
            json: true,
            directory: Some(dir.path().to_path_buf()),
        };

        let guard = init_tracing(&settings).unwrap();
        assert!(guard.is_some());
        drop(guard);

        let written = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX));
        assert!(written);

        // A second subscriber cannot be installed.
        assert!(matches!(
            init_tracing(&LoggingSettings::default()),
            Err(ConfigError::LoggingError(_))
        ));
    }
}
