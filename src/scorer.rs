use std::cmp::Ordering;

use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::forest::{ForestParams, IsolationForest};
use crate::stats;
use crate::table::{HealthTable, ScoredTable};

const SCORE_EPSILON: f64 = 1e-9;
const STD_FLOOR: f64 = 1e-9;

/// Model features present in `table`, in configured order.
pub fn available_features<'a>(table: &HealthTable, config: &'a PipelineConfig) -> Vec<&'a str> {
    config
        .model_features
        .iter()
        .filter(|name| table.has_column(name))
        .map(String::as_str)
        .collect()
}

/// Fits a fresh isolation forest on this batch and attaches a flag, a
/// `[0, 1]` anomaly score and the top driver features to every record.
pub fn score(
    table: &HealthTable,
    contamination: f64,
    config: &PipelineConfig,
) -> Result<ScoredTable> {
    let features = available_features(table, config);
    if features.is_empty() {
        return Err(PipelineError::Model(
            "No numeric feature columns found for modeling.".to_string(),
        ));
    }
    if !(contamination > 0.0 && contamination < 1.0) {
        return Err(PipelineError::Model(format!(
            "contamination must be between 0 and 1, got {contamination}"
        )));
    }
    if table.is_empty() {
        return Err(PipelineError::Model("No records left to score after cleaning.".to_string()));
    }

    let columns: Vec<&[f64]> = features
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    let matrix: Vec<Vec<f64>> = (0..table.len())
        .map(|i| columns.iter().map(|column| column[i]).collect())
        .collect();

    let params = ForestParams {
        n_estimators: config.n_estimators,
        max_samples: config.max_samples,
        contamination,
        seed: config.random_seed,
    };
    let forest = IsolationForest::fit(&matrix, &params)
        .ok_or_else(|| PipelineError::Model("isolation forest could not be fitted".to_string()))?;

    let decision = forest.decision_function(&matrix);
    let anomaly_scores = normalize_scores(&decision);
    let anomaly_flags: Vec<u8> = decision.iter().map(|&value| u8::from(value < 0.0)).collect();
    let anomaly_drivers =
        attribute_drivers(&columns, &features, &anomaly_flags, config.top_driver_count);

    let scored = ScoredTable {
        table: table.clone(),
        anomaly_flags,
        anomaly_scores,
        anomaly_drivers,
    };
    info!(
        records = scored.len(),
        features = features.len(),
        flagged = scored.anomaly_count(),
        contamination,
        "scored batch"
    );
    Ok(scored)
}

/// Inverts the model decision (higher = more typical) and min-max scales it
/// so the least typical record lands at 1.0.
pub fn normalize_scores(decision: &[f64]) -> Vec<f64> {
    let inverted: Vec<f64> = decision.iter().map(|value| -value).collect();
    let min = inverted.iter().copied().fold(f64::INFINITY, f64::min);
    let max = inverted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    inverted
        .iter()
        .map(|value| (value - min) / (max - min + SCORE_EPSILON))
        .collect()
}

/// Names the features with the largest absolute z-score for each flagged record.
fn attribute_drivers(
    columns: &[&[f64]],
    features: &[&str],
    flags: &[u8],
    top: usize,
) -> Vec<String> {
    let moments: Vec<(f64, f64)> = columns
        .iter()
        .map(|column| (stats::mean(column), stats::std_dev(column).max(STD_FLOOR)))
        .collect();

    flags
        .iter()
        .enumerate()
        .map(|(i, &flag)| {
            if flag == 0 {
                return String::new();
            }
            let mut ranked: Vec<(usize, f64)> = columns
                .iter()
                .zip(&moments)
                .enumerate()
                .map(|(f, (column, (mu, sd)))| (f, ((column[i] - mu) / sd).abs()))
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            ranked
                .iter()
                .take(top)
                .map(|&(f, _)| features[f])
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}
