use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::types::{PricePoint, RawSeries};

/// What the loaded series will be used for. Decides the minimum row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Needs at least one window plus its target
    Training,
    /// Needs one trailing window
    Serving,
}

impl LoadMode {
    pub fn min_rows(&self, window_size: usize) -> usize {
        match self {
            LoadMode::Training => window_size + 1,
            LoadMode::Serving => window_size,
        }
    }
}

/// Reads a CSV price file into a cleaned `RawSeries`.
#[derive(Debug, Clone)]
pub struct SeriesLoader {
    target_column: String,
    window_size: usize,
}

impl SeriesLoader {
    pub fn new(target_column: impl Into<String>, window_size: usize) -> Self {
        Self {
            target_column: target_column.into(),
            window_size,
        }
    }

    pub fn load_path(&self, path: &Path, mode: LoadMode) -> Result<RawSeries> {
        let file = File::open(path).map_err(|e| {
            warn!("Failed to open price file {}: {}", path.display(), e);
            PipelineError::Io(e)
        })?;
        self.load_reader(file, mode)
    }

    /// Parse a price table.
    ///
    /// Rows whose fields are all empty are skipped first. The target column is
    /// then coerced to a finite float and rows where that fails are dropped, so
    /// stray header rows (a ticker symbol under `Close`, for instance) vanish.
    /// The first column, when it is not the target, is read as the row
    /// timestamp; it only establishes order.
    pub fn load_reader<R: Read>(&self, reader: R, mode: LoadMode) -> Result<RawSeries> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.byte_headers()?.clone();
        let target_idx = headers
            .iter()
            .position(|h| h == self.target_column.as_bytes())
            .ok_or_else(|| {
                PipelineError::Schema(format!(
                    "target column '{}' not found (columns: {})",
                    self.target_column,
                    headers
                        .iter()
                        .map(String::from_utf8_lossy)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
        let index_idx = if target_idx == 0 { None } else { Some(0) };

        let mut points = Vec::new();
        let mut rows_read = 0usize;
        let mut empty_rows = 0usize;
        let mut non_numeric_rows = 0usize;

        // Byte records: only the target and index fields need to be text.
        for record in reader.byte_records() {
            let record = record?;
            rows_read += 1;

            if record.iter().all(|field| field.is_empty()) {
                empty_rows += 1;
                continue;
            }

            let close = match record
                .get(target_idx)
                .and_then(|field| std::str::from_utf8(field).ok())
                .and_then(parse_price)
            {
                Some(close) => close,
                None => {
                    non_numeric_rows += 1;
                    continue;
                }
            };

            let timestamp = index_idx
                .and_then(|idx| record.get(idx))
                .and_then(|field| std::str::from_utf8(field).ok())
                .and_then(parse_timestamp);

            points.push(PricePoint { timestamp, close });
        }

        debug!(
            "Loaded {} rows: {} kept, {} empty, {} non-numeric '{}'",
            rows_read,
            points.len(),
            empty_rows,
            non_numeric_rows,
            self.target_column
        );

        let required = mode.min_rows(self.window_size);
        if points.len() < required {
            return Err(PipelineError::InsufficientData {
                required,
                found: points.len(),
            });
        }

        RawSeries::new(points)
    }
}

fn parse_price(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(field, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.naive_utc());
    }
    DateTime::parse_from_rfc3339(field).ok().map(|ts| ts.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_with_closes(n: usize) -> String {
        let mut out = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
        for i in 0..n {
            let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                + chrono::Duration::days(i as i64);
            let close = 100.0 + i as f64;
            out.push_str(&format!(
                "{},{},{},{},{},{},1000\n",
                day.format("%Y-%m-%d"),
                close,
                close + 1.0,
                close - 1.0,
                close,
                close
            ));
        }
        out
    }

    #[test]
    fn test_load_valid_series() {
        let loader = SeriesLoader::new("Close", 5);
        let series = loader
            .load_reader(csv_with_closes(8).as_bytes(), LoadMode::Training)
            .unwrap();
        assert_eq!(series.len(), 8);
        assert_eq!(series.closes()[0], 100.0);
        assert!(series.last().and_then(|p| p.timestamp).is_some());
    }

    #[test]
    fn test_invalid_utf8_outside_target_is_ignored() {
        let mut data = b"Date,Close,Note\n2024-01-01,100,ok\n2024-01-02,101,".to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        data.extend_from_slice(b"\n2024-01-03,");
        data.push(0xff);
        data.extend_from_slice(b",x\n2024-01-04,103,y\n");

        let series = SeriesLoader::new("Close", 2)
            .load_reader(&data[..], LoadMode::Training)
            .unwrap();
        assert_eq!(series.closes(), vec![100.0, 101.0, 103.0]);
    }

    #[test]
    fn test_missing_target_column_is_schema_error() {
        let loader = SeriesLoader::new("Close", 2);
        let data = "Date,Open\n2024-01-01,1\n2024-01-02,2\n2024-01-03,3\n";
        let err = loader
            .load_reader(data.as_bytes(), LoadMode::Training)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
        assert!(err.to_string().contains("Close"));
    }

    #[test]
    fn test_too_few_rows_for_training() {
        let loader = SeriesLoader::new("Close", 5);
        let err = loader
            .load_reader(csv_with_closes(5).as_bytes(), LoadMode::Training)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { required: 6, found: 5 }
        ));
    }

    #[test]
    fn test_serving_needs_only_window_size_rows() {
        let loader = SeriesLoader::new("Close", 5);
        let series = loader
            .load_reader(csv_with_closes(5).as_bytes(), LoadMode::Serving)
            .unwrap();
        assert_eq!(series.len(), 5);

        let err = loader
            .load_reader(csv_with_closes(4).as_bytes(), LoadMode::Serving)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { required: 5, found: 4 }
        ));
    }

    #[test]
    fn test_drops_empty_and_non_numeric_rows() {
        // Second line mimics the ticker row of a multi-index export.
        let data = "Date,Close,Volume\n\
                    Ticker,PETR4.SA,PETR4.SA\n\
                    2024-01-01,10.5,100\n\
                    ,,\n\
                    2024-01-02,,100\n\
                    2024-01-03,11.0,100\n\
                    2024-01-04,NaN,100\n\
                    2024-01-05,12.25,100\n";
        let loader = SeriesLoader::new("Close", 2);
        let series = loader
            .load_reader(data.as_bytes(), LoadMode::Training)
            .unwrap();
        assert_eq!(series.closes(), vec![10.5, 11.0, 12.25]);
    }

    #[test]
    fn test_drop_counts_against_minimum() {
        let data = "Date,Close\n2024-01-01,1\n2024-01-02,abc\n2024-01-03,3\n";
        let loader = SeriesLoader::new("Close", 2);
        let err = loader
            .load_reader(data.as_bytes(), LoadMode::Training)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientData { required: 3, found: 2 }
        ));
    }

    #[test]
    fn test_out_of_order_dates_rejected() {
        let data = "Date,Close\n2024-01-02,1\n2024-01-01,2\n2024-01-03,3\n";
        let loader = SeriesLoader::new("Close", 2);
        let err = loader
            .load_reader(data.as_bytes(), LoadMode::Training)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("2024-03-01 00:00:00").is_some());
        assert!(parse_timestamp("2024-03-01 00:00:00-05:00").is_some());
        assert!(parse_timestamp("2024-03-01T00:00:00Z").is_some());
        assert!(parse_timestamp("Ticker").is_none());
        assert!(parse_timestamp("17").is_none());
    }
}
