use std::io::Write;

use log::LevelFilter;

const MAGENTA: &str = "\x1b[95m";
const RESET: &str = "\x1b[0m";

/// How the process logger should look. Passed once to [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Wrap messages in magenta.
    pub colored: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            colored: true,
        }
    }
}

impl LogConfig {
    /// Map a `-v` count onto a level: 0 → info, 1 → debug, 2+ → trace.
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        Self {
            level,
            ..Self::default()
        }
    }
}

/// Install the process logger: `timestamp - LEVEL - message`.
///
/// `RUST_LOG` still overrides the configured level.
pub fn init(config: &LogConfig) -> Result<(), log::SetLoggerError> {
    let colored = config.colored;
    env_logger::Builder::new()
        .filter_level(config.level)
        .parse_default_env()
        .format(move |buf, record| {
            let (start, end) = if colored { (MAGENTA, RESET) } else { ("", "") };
            writeln!(
                buf,
                "{} - {} - {start}{}{end}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(LogConfig::from_verbosity(0).level, LevelFilter::Info);
        assert_eq!(LogConfig::from_verbosity(1).level, LevelFilter::Debug);
        assert_eq!(LogConfig::from_verbosity(5).level, LevelFilter::Trace);
        assert!(LogConfig::from_verbosity(1).colored);
    }
}
