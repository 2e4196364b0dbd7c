use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::table::RawTable;

/// Decodes uploaded bytes, sniffs the delimiter from the header line and
/// reads the rest as rows. Blank lines ahead of the header are skipped.
pub fn parse(bytes: &[u8]) -> Result<RawTable> {
    let text = decode(bytes);
    let leading_blank: usize = text
        .split_inclusive('\n')
        .take_while(|line| line.trim().is_empty())
        .map(str::len)
        .sum();
    let body = &text[leading_blank..];
    let first_line = body.lines().next().unwrap_or("");
    if first_line.trim().is_empty() {
        return Err(PipelineError::Parse(
            "file is empty or has no header row".to_string(),
        ));
    }
    let delimiter = if first_line.contains('\t') { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| PipelineError::Parse(format!("unreadable header row: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|header| header.trim().is_empty()) {
        return Err(PipelineError::Parse("header row has no column names".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| PipelineError::Parse(err.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(
        columns = headers.len(),
        rows = rows.len(),
        tab_separated = delimiter == b'\t',
        "parsed upload"
    );
    Ok(RawTable::new(headers, rows))
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Normalizes header names and checks the configured mandatory columns.
///
/// Returns `(true, "")` when nothing is missing.
pub fn validate(table: &mut RawTable, config: &PipelineConfig) -> (bool, String) {
    table.normalize_headers();
    let missing: Vec<&str> = config
        .required_columns
        .iter()
        .filter(|column| !table.has_column(column))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        (true, String::new())
    } else {
        (
            false,
            format!("Missing required column(s): {}", missing.join(", ")),
        )
    }
}

/// [`validate`] lifted into the pipeline's error type.
pub fn ensure_schema(table: &mut RawTable, config: &PipelineConfig) -> Result<()> {
    match validate(table, config) {
        (true, _) => Ok(()),
        (false, reason) => Err(PipelineError::Schema(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_a_parse_error() {
        assert!(matches!(parse(b""), Err(PipelineError::Parse(_))));
        assert!(matches!(parse(b"\n\n"), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn comma_separated_by_default() {
        let table = parse(b"timestamp,heart_rate\n2024-01-01 00:00,72\n2024-01-01 01:00,75\n")
            .unwrap();
        assert_eq!(table.headers(), &["timestamp", "heart_rate"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][1], "75");
    }

    #[test]
    fn tab_in_first_line_switches_to_tsv() {
        let table = parse(b"timestamp\tsteps\n2024-01-01,1,200\t300\n").unwrap();
        assert_eq!(table.headers(), &["timestamp", "steps"]);
        assert_eq!(table.rows()[0], vec!["2024-01-01,1,200", "300"]);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let table = parse(b"\n  \r\ntimestamp\tsteps\n2024-01-01\t5\n").unwrap();
        assert_eq!(table.headers(), &["timestamp", "steps"]);
        assert_eq!(table.rows()[0], vec!["2024-01-01", "5"]);

        let table = parse(b"\n\ntimestamp,steps\n2024-01-01,5\n").unwrap();
        assert_eq!(table.headers(), &["timestamp", "steps"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn latin1_fallback_never_fails() {
        let bytes = b"note,steps\ncaf\xe9,10\n";
        let table = parse(bytes).unwrap();
        assert_eq!(table.rows()[0][0], "caf\u{e9}");
    }

    #[test]
    fn validate_normalizes_headers_without_requirements() {
        let mut table = parse(b" Heart_Rate ,STEPS\n70,100\n").unwrap();
        let (ok, reason) = validate(&mut table, &PipelineConfig::default());
        assert!(ok);
        assert_eq!(reason, "");
        assert_eq!(table.headers(), &["heart_rate", "steps"]);
    }

    #[test]
    fn validate_reports_configured_missing_columns() {
        let config = PipelineConfig {
            required_columns: vec!["timestamp".to_string(), "glucose".to_string()],
            ..PipelineConfig::default()
        };
        let mut table = parse(b"Timestamp,steps\n2024-01-01,100\n").unwrap();
        let (ok, reason) = validate(&mut table, &config);
        assert!(!ok);
        assert_eq!(reason, "Missing required column(s): glucose");
        assert!(matches!(
            ensure_schema(&mut table, &config),
            Err(PipelineError::Schema(_))
        ));
    }
}
