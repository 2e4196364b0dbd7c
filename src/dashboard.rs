use crate::config::PipelineConfig;
use crate::models::{DashboardSummary, MetricSeries, SeriesPoint};
use crate::table::ScoredTable;

fn metric_title(metric: &str) -> String {
    match metric {
        "heart_rate" => "Heart Rate (bpm)".to_string(),
        "steps" => "Steps".to_string(),
        "sleep_hours" => "Sleep (hours)".to_string(),
        "calories" => "Calories".to_string(),
        "glucose" => "Glucose (mg/dL)".to_string(),
        "blood_pressure_systolic" => "Systolic BP (mmHg)".to_string(),
        "blood_pressure_diastolic" => "Diastolic BP (mmHg)".to_string(),
        other => other.replace('_', " "),
    }
}

pub fn summarize(scored: &ScoredTable) -> DashboardSummary {
    let total_records = scored.len();
    let anomaly_count = scored.anomaly_count();
    let rate = 100.0 * anomaly_count as f64 / total_records.max(1) as f64;
    DashboardSummary {
        total_records,
        anomaly_count,
        anomaly_rate: (rate * 100.0).round() / 100.0,
    }
}

/// One series per report metric present in the table, in time order.
pub fn build_series(scored: &ScoredTable, config: &PipelineConfig) -> Vec<MetricSeries> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by_key(|&i| scored.timestamps()[i]);

    config
        .report_metrics
        .iter()
        .filter_map(|metric| {
            let column = scored.table.column(metric)?;
            let mut series = MetricSeries {
                metric: metric.clone(),
                title: metric_title(metric),
                normal: Vec::new(),
                anomalies: Vec::new(),
            };
            for &i in &order {
                if !column[i].is_finite() {
                    continue;
                }
                let flagged = scored.anomaly_flags[i] == 1;
                let point = SeriesPoint {
                    timestamp: scored.timestamps()[i],
                    value: column[i],
                    drivers: if flagged {
                        scored.anomaly_drivers[i].clone()
                    } else {
                        String::new()
                    },
                };
                if flagged {
                    series.anomalies.push(point);
                } else {
                    series.normal.push(point);
                }
            }
            Some(series)
        })
        .collect()
}
