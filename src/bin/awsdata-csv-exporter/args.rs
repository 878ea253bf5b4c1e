use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use weather_station::range::TimeRange;

#[derive(Debug, Parser)]
pub struct Args {
    /// One of 1h, 24h, 7d, 1m, all.
    #[arg(long, default_value = "24h")]
    pub range: TimeRange,

    /// Write to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_KEY", hide_env_values = true)]
    pub database_key: String,
}
