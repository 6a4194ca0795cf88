use clap::ValueEnum;
use tracing::Level;

/// Shape of log lines on stderr.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Most verbose level that is still emitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Route `tracing` events, including node diagnostics forwarded through
/// `TracingSink`, to stderr. Stdout stays reserved for packet output.
///
/// A second call is ignored.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::from(level))
        .with_ansi(false);

    let installed = match format {
        LogFormat::Text => subscriber.with_target(false).try_init(),
        // JSON keeps targets so `nodebus::diag` lines can be filtered downstream.
        LogFormat::Json => subscriber.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_in_order() {
        let levels = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
        .map(Level::from);
        // tracing orders more verbose levels as greater.
        assert!(levels.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn level_names_parse() {
        assert_eq!(LogLevel::from_str("warn", true), Ok(LogLevel::Warn));
        assert!(LogLevel::from_str("loud", true).is_err());
    }
}
