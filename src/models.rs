use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One persisted health record, as handed to and read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub timestamp: NaiveDateTime,
    pub heart_rate: Option<f64>,
    pub steps: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub calories: Option<f64>,
    pub blood_pressure_systolic: Option<f64>,
    pub blood_pressure_diastolic: Option<f64>,
    pub glucose: Option<f64>,
    pub anomaly_flag: i32,
    pub anomaly_score: f64,
    pub anomaly_drivers: String,
}

impl StoredRecord {
    pub fn feature(&self, name: &str) -> Option<f64> {
        match name {
            "heart_rate" => self.heart_rate,
            "steps" => self.steps,
            "sleep_hours" => self.sleep_hours,
            "calories" => self.calories,
            "blood_pressure_systolic" => self.blood_pressure_systolic,
            "blood_pressure_diastolic" => self.blood_pressure_diastolic,
            "glucose" => self.glucose,
            _ => None,
        }
    }

    pub fn set_feature(&mut self, name: &str, value: Option<f64>) {
        let slot = match name {
            "heart_rate" => &mut self.heart_rate,
            "steps" => &mut self.steps,
            "sleep_hours" => &mut self.sleep_hours,
            "calories" => &mut self.calories,
            "blood_pressure_systolic" => &mut self.blood_pressure_systolic,
            "blood_pressure_diastolic" => &mut self.blood_pressure_diastolic,
            "glucose" => &mut self.glucose,
            _ => return,
        };
        *slot = value;
    }

    pub fn empty(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            heart_rate: None,
            steps: None,
            sleep_hours: None,
            calories: None,
            blood_pressure_systolic: None,
            blood_pressure_diastolic: None,
            glucose: None,
            anomaly_flag: 0,
            anomaly_score: 0.0,
            anomaly_drivers: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    /// Mean per report metric, in the order of [`WeeklySummary::metrics`].
    pub means: Vec<f64>,
    pub anomalies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub date_range: String,
    pub records: usize,
    pub anomalies: usize,
    pub top_drivers: String,
    pub interpretation: String,
    pub metrics: Vec<String>,
    pub daily: Vec<DailyRollup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_records: usize,
    pub anomaly_count: usize,
    pub anomaly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub drivers: String,
}

/// Chart-ready data for one metric, split into normal and flagged points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub metric: String,
    pub title: String,
    pub normal: Vec<SeriesPoint>,
    pub anomalies: Vec<SeriesPoint>,
}
