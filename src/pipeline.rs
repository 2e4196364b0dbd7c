use tracing::info;

use crate::clean;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingest;
use crate::models::StoredRecord;
use crate::scorer;
use crate::table::{FeatureColumn, HealthTable, ScoredTable};

/// Runs ingest, schema check, cleaning and scoring over one uploaded file.
pub fn process_upload(bytes: &[u8], config: &PipelineConfig) -> Result<ScoredTable> {
    let mut raw = ingest::parse(bytes)?;
    ingest::ensure_schema(&mut raw, config)?;
    let cleaned = clean::clean(&raw, config);
    let scored = scorer::score(&cleaned, config.contamination, config)?;
    info!(
        bytes = bytes.len(),
        records = scored.len(),
        anomalies = scored.anomaly_count(),
        "processed upload"
    );
    Ok(scored)
}

/// Flattens a scored batch into storage rows. Features absent from the
/// batch are stored as `None`.
pub fn to_storage_rows(scored: &ScoredTable, config: &PipelineConfig) -> Vec<StoredRecord> {
    (0..scored.len())
        .map(|i| {
            let mut record = StoredRecord::empty(scored.timestamps()[i]);
            for name in &config.numeric_columns {
                record.set_feature(name, scored.table.column(name).map(|column| column[i]));
            }
            record.anomaly_flag = i32::from(scored.anomaly_flags[i]);
            record.anomaly_score = scored.anomaly_scores[i];
            record.anomaly_drivers = scored.anomaly_drivers[i].clone();
            record
        })
        .collect()
}

/// Rebuilds a scored table from stored rows, sorted by timestamp. A feature
/// column exists when any row carries it; rows without it hold NaN.
pub fn from_storage_rows(rows: &[StoredRecord], config: &PipelineConfig) -> ScoredTable {
    let mut rows: Vec<&StoredRecord> = rows.iter().collect();
    rows.sort_by_key(|row| row.timestamp);

    let features = config
        .numeric_columns
        .iter()
        .filter(|name| rows.iter().any(|row| row.feature(name).is_some()))
        .map(|name| FeatureColumn {
            name: name.clone(),
            values: rows
                .iter()
                .map(|row| row.feature(name).unwrap_or(f64::NAN))
                .collect(),
        })
        .collect();

    ScoredTable {
        table: HealthTable {
            timestamps: rows.iter().map(|row| row.timestamp).collect(),
            features,
            extras: Vec::new(),
        },
        anomaly_flags: rows.iter().map(|row| u8::from(row.anomaly_flag == 1)).collect(),
        anomaly_scores: rows.iter().map(|row| row.anomaly_score).collect(),
        anomaly_drivers: rows.iter().map(|row| row.anomaly_drivers.clone()).collect(),
    }
}
