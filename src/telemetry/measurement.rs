use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),

    Text(String),

    Null,
}

/// One decoded payload: flat key/value pairs in the order the sensor sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMeasurement {
    fields: IndexMap<String, FieldValue>,
}

impl RawMeasurement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for RawMeasurement {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
