//! Configuration acquisition: CLI flags plus an optional TOML file
//! (SPEC_FULL.md §6.1). This is an external collaborator per spec.md §1 —
//! the ring core only ever sees the resolved [`RingConfig`].
//!
//! Grounded on `examples/r3bl-org-r3bl-open-core/cmdr/src/giti/clap_config.rs`
//! for the `clap` derive shape.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Parser)]
#[command(
    name = "ringmoot",
    about = "Simulate a ring of workers holding Chang-Roberts elections",
    version
)]
pub struct Cli {
    /// Number of workers in the ring.
    pub size: Option<usize>,

    /// Optional TOML configuration file; CLI flags override its values.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of elections after which to finish. 0 is infinite unless
    /// `--command-line` is set.
    #[arg(short = 'n', long = "number-of-elections", default_value_t = 0)]
    pub number_of_elections: u32,

    /// Sleep time after each election, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub sleep: u64,

    /// Per-worker pacing delay, in milliseconds.
    #[arg(long = "worker-sleep", default_value_t = 500)]
    pub worker_sleep: u64,

    /// Log to the console.
    #[arg(long = "log-console")]
    pub log_console: bool,

    /// Log to a file at this path.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Include timestamps in log lines.
    #[arg(long = "log-date")]
    pub log_date: bool,

    /// Log level floor, 0 (trace) through 5 (critical).
    #[arg(long = "log-level", value_name = "0..5")]
    pub log_level: Option<u8>,

    /// Suppress the startup banner line.
    #[arg(long = "no-config-log")]
    pub no_config_log: bool,

    /// Enable the interactive operator console.
    #[arg(long = "command-line")]
    pub command_line: bool,
}

/// The subset of fields a TOML config file may set; anything also given on
/// the CLI takes precedence (SPEC_FULL.md §6.1).
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub size: Option<usize>,
    pub number_of_elections: Option<u32>,
    pub sleep: Option<u64>,
    pub worker_sleep: Option<u64>,
    pub log_console: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub log_date: Option<bool>,
    pub log_level: Option<u8>,
    pub no_config_log: Option<bool>,
    pub command_line: Option<bool>,
}

/// The fully resolved configuration the ring core consumes.
#[derive(Debug, Clone)]
pub struct RingConfig {
    pub size: usize,
    pub number_of_elections: u32,
    pub sleep_ms: u64,
    pub worker_sleep_ms: u64,
    pub log_console: bool,
    pub log_file: Option<PathBuf>,
    pub log_date: bool,
    pub log_level: u8,
    pub no_config_log: bool,
    pub command_line: bool,
}

impl RingConfig {
    /// Merges CLI flags over an optional file config, then validates.
    pub fn resolve(cli: Cli) -> Result<Self, AppError> {
        let file_config = match &cli.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path).unwrap_or_default();
                toml::from_str::<FileConfig>(&contents)?
            }
            None => FileConfig::default(),
        };

        let size = cli.size.or(file_config.size).ok_or(AppError::MissingSize)?;

        Ok(RingConfig {
            size,
            number_of_elections: non_default_u32(cli.number_of_elections)
                .or(file_config.number_of_elections)
                .unwrap_or(0),
            sleep_ms: non_default_u64(cli.sleep, 5000).or(file_config.sleep).unwrap_or(5000),
            worker_sleep_ms: non_default_u64(cli.worker_sleep, 500)
                .or(file_config.worker_sleep)
                .unwrap_or(500),
            log_console: cli.log_console || file_config.log_console.unwrap_or(false),
            log_file: cli.log_file.or(file_config.log_file),
            log_date: cli.log_date || file_config.log_date.unwrap_or(false),
            log_level: cli.log_level.or(file_config.log_level).unwrap_or(2),
            no_config_log: cli.no_config_log || file_config.no_config_log.unwrap_or(false),
            command_line: cli.command_line || file_config.command_line.unwrap_or(false),
        })
    }
}

/// clap gives us the default value even when the flag was never passed, so a
/// CLI value equal to the default defers to the file instead of always
/// winning.
fn non_default_u32(value: u32) -> Option<u32> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn non_default_u64(value: u64, default: u64) -> Option<u64> {
    if value == default {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_size_is_an_error() {
        let cli = Cli::parse_from(["ringmoot"]);
        let err = RingConfig::resolve(cli).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cli_size_resolves() {
        let cli = Cli::parse_from(["ringmoot", "5"]);
        let config = RingConfig::resolve(cli).unwrap();
        assert_eq!(config.size, 5);
        assert_eq!(config.sleep_ms, 5000);
        assert_eq!(config.worker_sleep_ms, 500);
    }
}
