use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use crate::config::PipelineConfig;
use crate::models::{DailyRollup, WeeklySummary};
use crate::stats;
use crate::table::ScoredTable;

pub const INTERPRETATION: &str = "This weekly summary highlights recent trends and any data points \
that were flagged as unusual compared to the user's recent baseline. A higher anomaly count does \
not automatically indicate a medical issue; it may reflect sensor noise, schedule changes, or \
one-time events. Use flagged periods as prompts to review context.";

/// Indices of records within `days` of the latest timestamp.
pub fn window_indices(scored: &ScoredTable, days: i64) -> Vec<usize> {
    let Some(&latest) = scored.timestamps().iter().max() else {
        return Vec::new();
    };
    let start = latest - Duration::days(days);
    let indices: Vec<usize> = (0..scored.len())
        .filter(|&i| scored.timestamps()[i] >= start)
        .collect();
    if indices.is_empty() {
        (0..scored.len()).collect()
    } else {
        indices
    }
}

/// Rolls the latest week of scored records up per day. `None` means there is
/// nothing to report.
pub fn generate_weekly_summary(
    scored: &ScoredTable,
    config: &PipelineConfig,
) -> Option<WeeklySummary> {
    if scored.is_empty() {
        return None;
    }

    let indices = window_indices(scored, config.window_days);
    let metrics: Vec<String> = config
        .report_metrics
        .iter()
        .filter(|name| scored.table.has_column(name))
        .cloned()
        .collect();
    let daily = daily_rollup(scored, &indices, &metrics);
    let date_range = match (daily.first(), daily.last()) {
        (Some(first), Some(last)) => format!("{} to {}", first.date, last.date),
        _ => String::new(),
    };

    Some(WeeklySummary {
        date_range,
        records: indices.len(),
        anomalies: indices.iter().filter(|&&i| scored.anomaly_flags[i] == 1).count(),
        top_drivers: dominant_drivers(scored, &indices, config.dominant_driver_count),
        interpretation: INTERPRETATION.to_string(),
        metrics,
        daily,
    })
}

fn daily_rollup(scored: &ScoredTable, indices: &[usize], metrics: &[String]) -> Vec<DailyRollup> {
    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for &i in indices {
        by_date.entry(scored.timestamps()[i].date()).or_default().push(i);
    }

    by_date
        .into_iter()
        .map(|(date, rows)| {
            let means = metrics
                .iter()
                .map(|metric| {
                    let column = scored.table.column(metric).unwrap_or(&[]);
                    let values: Vec<f64> = rows
                        .iter()
                        .filter_map(|&i| column.get(i).copied())
                        .filter(|value| value.is_finite())
                        .collect();
                    stats::mean(&values)
                })
                .collect();
            let anomalies = rows.iter().filter(|&&i| scored.anomaly_flags[i] == 1).count();
            DailyRollup {
                date,
                means,
                anomalies,
            }
        })
        .collect()
}

/// Most frequent driver strings among flagged records, or "N/A".
pub fn dominant_drivers(scored: &ScoredTable, indices: &[usize], top: usize) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, &i) in indices.iter().enumerate() {
        let drivers = scored.anomaly_drivers[i].as_str();
        if scored.anomaly_flags[i] != 1 || drivers.is_empty() {
            continue;
        }
        counts.entry(drivers).or_insert((0, order)).0 += 1;
    }
    if counts.is_empty() {
        return "N/A".to_string();
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .iter()
        .take(top)
        .map(|(drivers, _)| *drivers)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Daily rollup as CSV: `date,<metrics...>,anomalies`.
pub fn to_csv_bytes(summary: &WeeklySummary) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["date".to_string()];
    header.extend(summary.metrics.iter().cloned());
    header.push("anomalies".to_string());
    writer.write_record(&header)?;

    for day in &summary.daily {
        let mut record = vec![day.date.to_string()];
        record.extend(day.means.iter().map(|mean| {
            if mean.is_finite() {
                mean.to_string()
            } else {
                String::new()
            }
        }));
        record.push(day.anomalies.to_string());
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|err| err.into_error().into())
}
