/// Column names and model parameters shared by every pipeline stage.
///
/// Passed by reference into each component so tests can run the pipeline
/// against alternate feature sets.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub timestamp_column: String,
    /// Features coerced, imputed and clipped by the cleaner.
    pub numeric_columns: Vec<String>,
    /// Features fed to the isolation forest.
    pub model_features: Vec<String>,
    /// Features rolled up in the weekly report and dashboard.
    pub report_metrics: Vec<String>,
    pub required_columns: Vec<String>,
    /// Expected outlier fraction in each batch.
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub random_seed: u64,
    pub window_days: i64,
    pub top_driver_count: usize,
    pub dominant_driver_count: usize,
}

pub const DEFAULT_CONTAMINATION: f64 = 0.03;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let tracked = ["heart_rate", "steps", "sleep_hours", "calories", "glucose"];
        Self {
            timestamp_column: "timestamp".to_string(),
            numeric_columns: names(&[
                "heart_rate",
                "steps",
                "sleep_hours",
                "calories",
                "blood_pressure_systolic",
                "blood_pressure_diastolic",
                "glucose",
            ]),
            model_features: names(&tracked),
            report_metrics: names(&tracked),
            required_columns: Vec::new(),
            contamination: DEFAULT_CONTAMINATION,
            n_estimators: 200,
            max_samples: 256,
            random_seed: 7,
            window_days: 7,
            top_driver_count: 2,
            dominant_driver_count: 3,
        }
    }
}

impl PipelineConfig {
    pub fn with_contamination(&self, contamination: f64) -> Self {
        Self {
            contamination,
            ..self.clone()
        }
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|name| name == column)
    }
}

/// `clap` value parser for the `--contamination` flag.
pub fn parse_contamination(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("contamination must be between 0 and 1, got {value}"))
    }
}
