use std::fmt;

use chrono::{DateTime, Utc};

/// The seven measurements a weather station reports, keyed by their `awsdata` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Temperature,
    RelativeHumidity,
    WindDirection,
    WindSpeed,
    Pressure,
    Radiation,
    Precipitation,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Temperature,
        Field::RelativeHumidity,
        Field::WindDirection,
        Field::WindSpeed,
        Field::Pressure,
        Field::Radiation,
        Field::Precipitation,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Field::Temperature => "temp",
            Field::RelativeHumidity => "rh",
            Field::WindDirection => "wind_direction",
            Field::WindSpeed => "wind_speed",
            Field::Pressure => "pressure",
            Field::Radiation => "radiation",
            Field::Precipitation => "precipitation",
        }
    }

    pub fn from_column(column: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.column() == column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorRecord {
    pub temperature: Option<f64>,

    pub relative_humidity: Option<f64>,

    pub wind_direction: Option<f64>,

    pub wind_speed: Option<f64>,

    pub pressure: Option<f64>,

    pub radiation: Option<f64>,

    pub precipitation: Option<f64>,
}

impl SensorRecord {
    pub fn get(&self, field: Field) -> Option<f64> {
        *self.slot(field)
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        *self.slot_mut(field) = value;
    }

    fn slot(&self, field: Field) -> &Option<f64> {
        match field {
            Field::Temperature => &self.temperature,
            Field::RelativeHumidity => &self.relative_humidity,
            Field::WindDirection => &self.wind_direction,
            Field::WindSpeed => &self.wind_speed,
            Field::Pressure => &self.pressure,
            Field::Radiation => &self.radiation,
            Field::Precipitation => &self.precipitation,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<f64> {
        match field {
            Field::Temperature => &mut self.temperature,
            Field::RelativeHumidity => &mut self.relative_humidity,
            Field::WindDirection => &mut self.wind_direction,
            Field::WindSpeed => &mut self.wind_speed,
            Field::Pressure => &mut self.pressure,
            Field::Radiation => &mut self.radiation,
            Field::Precipitation => &mut self.precipitation,
        }
    }
}

/// Identity the store assigns to an inserted `awsdata` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: RecordId,

    pub created_at: DateTime<Utc>,

    pub record: SensorRecord,
}
