mod args;
mod csv;

use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context as _;
use args::Args;
use chrono::Utc;
use clap::Parser as _;
use weather_station::{
    config::StoreConfig,
    db::{get_sensor_records_since, new_pool},
};

use crate::csv::CsvRecordWriter;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let store = StoreConfig::new(args.database_url, args.database_key)
        .context("invalid store configuration")?;
    let pool = new_pool(&store, ACQUIRE_TIMEOUT).context("failed to configure database pool")?;

    let since = args.range.since(Utc::now());
    let records = get_sensor_records_since(&pool, since)
        .await
        .with_context(|| format!("failed to fetch records for range {}", args.range.as_str()))?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create file: {path:?}"))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    let mut writer =
        CsvRecordWriter::new(out, args.timezone).context("failed to create CSV writer")?;
    for record in &records {
        writer.write(record)?;
    }
    writer.finish()?;

    eprintln!(
        "Exported {} records ({}) to {}",
        records.len(),
        args.range.as_str(),
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    );

    Ok(())
}
