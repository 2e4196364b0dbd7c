use std::collections::HashSet;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::stats;
use crate::table::{FeatureColumn, HealthTable, RawTable, TextColumn, TIMESTAMP_FORMAT};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Repairs an uploaded table into a sorted, fully populated time series,
/// using the current local time for any synthesized timestamps.
pub fn clean(raw: &RawTable, config: &PipelineConfig) -> HealthTable {
    clean_at(raw, config, Local::now().naive_local())
}

pub fn clean_at(raw: &RawTable, config: &PipelineConfig, now: NaiveDateTime) -> HealthTable {
    let mut table = raw.clone();
    table.normalize_headers();

    let raw_timestamps: Vec<String> = match table.column(&config.timestamp_column) {
        Some(values) => values.into_iter().map(str::to_string).collect(),
        None => {
            debug!(rows = table.len(), "no timestamp column, synthesizing hourly sequence");
            synthesize_timestamps(table.len(), now)
                .iter()
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                .collect()
        }
    };

    let mut seen = HashSet::new();
    let unique: Vec<usize> = (0..table.len())
        .filter(|&i| seen.insert(raw_timestamps[i].as_str()))
        .collect();
    let duplicates = table.len() - unique.len();

    let mut kept: Vec<(usize, NaiveDateTime)> = unique
        .into_iter()
        .filter_map(|i| parse_timestamp(&raw_timestamps[i]).map(|ts| (i, ts)))
        .collect();
    let unparsable = table.len() - duplicates - kept.len();
    kept.sort_by_key(|&(_, ts)| ts);

    let mut features = Vec::new();
    let mut extras = Vec::new();
    for name in &config.numeric_columns {
        if let Some(cells) = table.column(name) {
            let parsed: Vec<Option<f64>> =
                kept.iter().map(|&(i, _)| parse_number(cells[i])).collect();
            let mut values = impute(name, &parsed);
            clip_outliers(name, &mut values);
            features.push(FeatureColumn {
                name: name.clone(),
                values,
            });
        }
    }
    for (index, header) in table.headers().iter().enumerate() {
        if header == &config.timestamp_column || config.is_numeric(header) {
            continue;
        }
        extras.push(TextColumn {
            name: header.clone(),
            values: kept.iter().map(|&(i, _)| table.rows()[i][index].clone()).collect(),
        });
    }

    info!(
        input_rows = table.len(),
        output_rows = kept.len(),
        duplicates,
        unparsable,
        features = features.len(),
        "cleaned batch"
    );

    HealthTable {
        timestamps: kept.into_iter().map(|(_, ts)| ts).collect(),
        features,
        extras,
    }
}

/// Hourly sequence of `count` timestamps, the last one at `end`.
pub fn synthesize_timestamps(count: usize, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    (0..count)
        .map(|i| end - Duration::hours((count - 1 - i) as i64))
        .collect()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Non-numeric and non-finite tokens count as missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Fills interior gaps by linear interpolation between the nearest known
/// neighbours, and leading/trailing gaps with the median of known values.
fn impute(name: &str, values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, value)| value.map(|v| (i, v)))
        .collect();

    let fallback = match stats::median(&known.iter().map(|&(_, v)| v).collect::<Vec<_>>()) {
        Some(median) => median,
        None => {
            if !values.is_empty() {
                warn!(column = name, "column has no numeric values, filling with zero");
            }
            0.0
        }
    };

    let mut next_known = 0;
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            if let Some(v) = value {
                return *v;
            }
            while next_known < known.len() && known[next_known].0 < i {
                next_known += 1;
            }
            let before = next_known.checked_sub(1).map(|k| known[k]);
            let after = known.get(next_known).copied();
            match (before, after) {
                (Some((i0, v0)), Some((i1, v1))) => {
                    v0 + (v1 - v0) * (i - i0) as f64 / (i1 - i0) as f64
                }
                _ => fallback,
            }
        })
        .collect()
}

/// Clips to the samples bounding the 1st..99th percentile range unless that
/// range is degenerate.
fn clip_outliers(name: &str, values: &mut [f64]) {
    let Some((lo, hi)) = stats::inner_bounds(values, 1.0, 99.0) else {
        return;
    };
    if lo < hi {
        for value in values.iter_mut() {
            *value = value.clamp(lo, hi);
        }
        debug!(column = name, lo, hi, "clipped column");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use proptest::prelude::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap()
    }

    fn raw(text: &str) -> RawTable {
        ingest::parse(text.as_bytes()).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn synthesizes_hourly_timestamps_when_missing() {
        let table = clean_at(&raw("note\na\nb\nc\nd\ne\n"), &config(), now());
        assert_eq!(table.len(), 5);
        assert_eq!(table.timestamps[4], now());
        assert_eq!(table.timestamps[0], now() - Duration::hours(4));
        for pair in table.timestamps.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(1));
        }
        assert_eq!(table.extras[0].values, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn synthesized_timestamps_end_near_wall_clock() {
        let before = Local::now().naive_local();
        let table = clean(&raw("steps\n1\n2\n3\n4\n5\n"), &config());
        let after = Local::now().naive_local();
        let last = table.timestamps[4];
        assert!(last >= before && last <= after);
    }

    #[test]
    fn keeps_first_row_per_timestamp_and_drops_unparsable() {
        let table = clean_at(
            &raw("Timestamp,Heart_Rate,Note\n\
                  2024-01-01 02:00,70,second\n\
                  2024-01-01 01:00,60,first\n\
                  2024-01-01 02:00,99,duplicate\n\
                  not a date,80,bad\n\
                  ,81,blank\n"),
            &config(),
            now(),
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.extras[0].values, vec!["first", "second"]);
        assert!(table.timestamps[0] < table.timestamps[1]);
    }

    #[test]
    fn interpolates_interior_and_uses_median_at_edges() {
        let table = clean_at(
            &raw("timestamp,glucose\n\
                  2024-01-01,\n\
                  2024-01-02,100\n\
                  2024-01-03,abc\n\
                  2024-01-04,120\n\
                  2024-01-05,130\n\
                  2024-01-06,NaN\n"),
            &config(),
            now(),
        );
        let glucose = table.column("glucose").unwrap();
        assert_eq!(glucose.len(), 6);
        // Extremes are clipped to the samples just inside the 1st/99th percentiles.
        assert_eq!(glucose, &[120.0, 110.0, 110.0, 120.0, 120.0, 120.0]);
    }

    #[test]
    fn all_missing_column_is_still_populated() {
        let table = clean_at(
            &raw("timestamp,calories\n2024-01-01,x\n2024-01-02,\n"),
            &config(),
            now(),
        );
        assert_eq!(table.column("calories"), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn clipping_bounds_values_to_percentiles() {
        let mut text = String::from("timestamp,heart_rate\n");
        for i in 0..100 {
            let minute = i / 60;
            let second = i % 60;
            text.push_str(&format!("2024-01-01T00:{minute:02}:{second:02},{}\n", 60 + (i % 41)));
        }
        text.push_str("2024-01-02T00:00:00,250\n");
        let raw = raw(&text);
        let before: Vec<f64> = raw
            .column("heart_rate")
            .unwrap()
            .iter()
            .map(|v| v.parse().unwrap())
            .collect();
        let lo = stats::percentile(&before, 1.0).unwrap();
        let hi = stats::percentile(&before, 99.0).unwrap();

        let table = clean_at(&raw, &config(), now());
        let hr = table.column("heart_rate").unwrap();
        assert!(hr.iter().all(|&v| v >= lo && v <= hi));
        assert!(hr[100] < 250.0);
    }

    #[test]
    fn constant_column_is_not_clipped() {
        let table = clean_at(
            &raw("timestamp,sleep_hours\n2024-01-01,7\n2024-01-02,7\n2024-01-03,7\n"),
            &config(),
            now(),
        );
        assert_eq!(table.column("sleep_hours"), Some(&[7.0, 7.0, 7.0][..]));
    }

    #[test]
    fn extra_columns_pass_through() {
        let table = clean_at(
            &raw("timestamp,note,steps\n2024-01-02,b,5\n2024-01-01,a,x\n"),
            &config(),
            now(),
        );
        assert_eq!(table.extras.len(), 1);
        assert_eq!(table.extras[0].name, "note");
        assert_eq!(table.extras[0].values, vec!["a", "b"]);
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 3)
            .and_then(|d| d.and_hms_opt(4, 5, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2024-02-03 04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-03T04:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-03T04:05:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("02/03/2024 04:05"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-02-03"),
            NaiveDate::from_ymd_opt(2024, 2, 3).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    fn heart_rate_csv(values: &[Option<u32>]) -> String {
        let mut text = String::from("timestamp,heart_rate\n");
        for (i, value) in values.iter().enumerate() {
            let cell = value.map(|v| v.to_string()).unwrap_or_default();
            text.push_str(&format!("2024-01-01T{:02}:{:02}:00,{cell}\n", i / 60, i % 60));
        }
        text
    }

    #[test]
    fn cleaning_twice_is_stable_for_uneven_row_counts() {
        for rows in [20u32, 37, 50, 64, 100, 101] {
            let values: Vec<Option<u32>> = (0..rows).map(|i| Some(55 + i * 37 % 50)).collect();
            let once = clean_at(&raw(&heart_rate_csv(&values)), &config(), now());
            let twice = clean_at(&once.to_raw(), &config(), now());
            assert_eq!(once, twice, "{rows} rows");
        }
    }

    proptest! {
        #[test]
        fn cleaning_twice_is_stable(values in proptest::collection::vec(
            proptest::option::weighted(0.9, 30u32..220),
            5..160,
        )) {
            let once = clean_at(&raw(&heart_rate_csv(&values)), &config(), now());
            let twice = clean_at(&once.to_raw(), &config(), now());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn clipped_values_stay_within_input_percentiles(
            values in proptest::collection::vec(30u32..220, 5..160),
        ) {
            let input: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
            let lo = stats::percentile(&input, 1.0).unwrap();
            let hi = stats::percentile(&input, 99.0).unwrap();
            let cells: Vec<Option<u32>> = values.into_iter().map(Some).collect();
            let table = clean_at(&raw(&heart_rate_csv(&cells)), &config(), now());
            let hr = table.column("heart_rate").unwrap();
            if lo < hi {
                prop_assert!(hr.iter().all(|&v| v >= lo && v <= hi));
            }
        }

        #[test]
        fn output_row_count_equals_distinct_timestamps(
            hours in proptest::collection::vec(0u32..24, 1..40),
        ) {
            let mut text = String::from("timestamp,steps\n");
            for (i, hour) in hours.iter().enumerate() {
                text.push_str(&format!("2024-05-01 {hour:02}:00,{i}\n"));
            }
            let distinct: HashSet<u32> = hours.iter().copied().collect();
            let table = clean_at(&raw(&text), &config(), now());
            prop_assert_eq!(table.len(), distinct.len());
            prop_assert!(table.timestamps.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn every_present_feature_is_finite(cells in proptest::collection::vec(
            prop_oneof![
                Just(String::new()),
                Just("n/a".to_string()),
                (0i32..300).prop_map(|v| v.to_string()),
            ],
            1..30,
        )) {
            let mut text = String::from("timestamp,heart_rate\n");
            for (i, cell) in cells.iter().enumerate() {
                text.push_str(&format!("2024-05-01T00:{i:02}:00,{cell}\n"));
            }
            let table = clean_at(&raw(&text), &config(), now());
            let hr = table.column("heart_rate").unwrap();
            prop_assert_eq!(hr.len(), cells.len());
            prop_assert!(hr.iter().all(|v| v.is_finite()));
        }
    }
}
