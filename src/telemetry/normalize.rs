use tracing::warn;

use crate::telemetry::{Field, FieldValue, RawMeasurement, SensorRecord};

/// Maps sensor firmware keys onto the canonical record.
///
/// Keys are matched after lower-casing and turning every `.` into `_`, so
/// `Temp`, `TEMP` and `temp` all land in `temperature` and `wind.Direction`
/// lands in `wind_direction`. Unrecognized keys are dropped and fields the
/// payload never mentions stay `None`. This never fails.
pub fn normalize(raw: &RawMeasurement) -> SensorRecord {
    let mut record = SensorRecord::default();

    for (key, value) in raw.iter() {
        let Some(field) = Field::from_column(&normalize_key(key)) else {
            warn!(key, "unknown measurement key, dropping");
            continue;
        };

        record.set(field, to_number(key, value));
    }

    record
}

pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace('.', "_")
}

fn to_number(key: &str, value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(v) if v.is_finite() => Some(*v),
        FieldValue::Number(_) => None,
        FieldValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                warn!(key, value = %s, "non-numeric measurement value, storing null");
                None
            }
        },
        FieldValue::Null => None,
    }
}
