use clap::Parser;
use metalog_core::DEFAULT_REFRESH_PERIOD;
use std::path::PathBuf;
use std::time::Duration;

pub const REFRESH_ENV: &str = "METALOG_REFRESH_SECS";
pub const LOG_FILE_ENV: &str = "METALOG_LOG_FILE";

#[derive(Parser, Debug)]
#[command(name = "metalog-ui")]
#[command(about = "Terminal dashboard for pipeline metalog databases", long_about = None)]
pub struct Cli {
    /// Path to the SQLite metalog database
    pub db_path: PathBuf,
    /// Seconds between automatic refreshes
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub refresh_period: Duration,
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// The flag wins over the environment; unusable environment values fall
    /// back to the default period.
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let refresh_secs = cli
            .interval
            .or_else(|| env(REFRESH_ENV).and_then(|value| parse_secs(&value)))
            .unwrap_or(DEFAULT_REFRESH_PERIOD.as_secs());
        let log_file = env(LOG_FILE_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Config {
            db_path: cli.db_path,
            refresh_period: Duration::from_secs(refresh_secs),
            log_file,
        }
    }
}

pub fn load() -> Config {
    Config::resolve(Cli::parse(), |key| std::env::var(key).ok())
}

fn parse_secs(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}
