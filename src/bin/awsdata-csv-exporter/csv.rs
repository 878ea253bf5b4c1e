use std::io::Write;

use anyhow::{Context as _, Result};
use chrono::SecondsFormat;
use chrono_tz::Tz;
use csv::Writer;
use weather_station::telemetry::{Field, StoredRecord};

pub struct CsvRecordWriter<W: Write> {
    writer: Writer<W>,
    timezone: Tz,
}

impl<W: Write> CsvRecordWriter<W> {
    pub fn new(inner: W, timezone: Tz) -> Result<Self> {
        let mut writer = Writer::from_writer(inner);

        let mut header = vec!["id", "created_at"];
        header.extend(Field::ALL.iter().map(|f| f.column()));
        writer
            .write_record(&header)
            .context("failed to write CSV header")?;

        Ok(Self { writer, timezone })
    }

    pub fn write(&mut self, stored: &StoredRecord) -> Result<()> {
        let created_at = stored
            .created_at
            .with_timezone(&self.timezone)
            .to_rfc3339_opts(SecondsFormat::Millis, false);

        let mut row = vec![stored.id.to_string(), created_at];
        row.extend(
            Field::ALL
                .iter()
                .map(|f| stored.record.get(*f).map(|v| v.to_string()).unwrap_or_default()),
        );

        self.writer
            .write_record(&row)
            .with_context(|| format!("failed to write CSV row for record {}", stored.id))
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().context("failed to flush CSV output")
    }
}
