use chrono::NaiveDateTime;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Header-plus-rows view of an uploaded file, every cell kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Rows are padded with empty cells or truncated to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Trims and lowercases header names in place.
    pub fn normalize_headers(&mut self) {
        for header in self.headers.iter_mut() {
            *header = normalize_name(header);
        }
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Column the cleaner does not recognize, carried through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Cleaned, time-sorted batch with one typed column per recognized feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HealthTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub features: Vec<FeatureColumn>,
    pub extras: Vec<TextColumn>,
}

impl HealthTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.features.iter().any(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.features
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|column| column.name.as_str()).collect()
    }

    /// Renders the table back to text cells, e.g. to feed it through the
    /// cleaner a second time.
    pub fn to_raw(&self) -> RawTable {
        let mut headers = vec!["timestamp".to_string()];
        headers.extend(self.features.iter().map(|column| column.name.clone()));
        headers.extend(self.extras.iter().map(|column| column.name.clone()));

        let rows = (0..self.len())
            .map(|i| {
                let mut row = vec![self.timestamps[i].format(TIMESTAMP_FORMAT).to_string()];
                row.extend(self.features.iter().map(|column| column.values[i].to_string()));
                row.extend(self.extras.iter().map(|column| column.values[i].clone()));
                row
            })
            .collect();

        RawTable::new(headers, rows)
    }
}

/// Health table plus the per-record model output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoredTable {
    pub table: HealthTable,
    pub anomaly_flags: Vec<u8>,
    pub anomaly_scores: Vec<f64>,
    pub anomaly_drivers: Vec<String>,
}

impl ScoredTable {
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.table.timestamps
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomaly_flags.iter().filter(|&&flag| flag == 1).count()
    }

    pub fn flagged_indices(&self) -> Vec<usize> {
        self.anomaly_flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| **flag == 1)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn raw_rows_are_padded_to_header_width() {
        let table = RawTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string()], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(table.rows()[0], vec!["1".to_string(), String::new()]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn normalize_headers_trims_and_lowercases() {
        let mut table = RawTable::new(vec!["  Heart_Rate ".to_string()], vec![]);
        table.normalize_headers();
        assert!(table.has_column("heart_rate"));
    }

    #[test]
    fn health_table_column_lookup() {
        let table = HealthTable {
            timestamps: vec![ts(1), ts(2)],
            features: vec![FeatureColumn {
                name: "steps".to_string(),
                values: vec![10.0, 20.0],
            }],
            extras: vec![],
        };
        assert!(table.has_column("steps"));
        assert!(!table.has_column("glucose"));
        assert_eq!(table.column("steps"), Some(&[10.0, 20.0][..]));
    }

    #[test]
    fn to_raw_renders_iso_timestamps() {
        let table = HealthTable {
            timestamps: vec![ts(5)],
            features: vec![FeatureColumn {
                name: "glucose".to_string(),
                values: vec![98.5],
            }],
            extras: vec![TextColumn {
                name: "note".to_string(),
                values: vec!["fasted".to_string()],
            }],
        };
        let raw = table.to_raw();
        assert_eq!(raw.headers(), &["timestamp", "glucose", "note"]);
        assert_eq!(raw.rows()[0], vec!["2024-03-01T05:00:00", "98.5", "fasted"]);
    }
}
