use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// One cleaned row of the price file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Parsed index column, when it holds a recognisable date
    pub timestamp: Option<NaiveDateTime>,
    pub close: f64,
}

/// Ordered, cleaned close-price series for a single instrument.
///
/// Construction checks that every close is finite and that parsed timestamps
/// are strictly increasing. The series is immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    points: Vec<PricePoint>,
}

impl RawSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        let mut previous: Option<NaiveDateTime> = None;
        for (i, point) in points.iter().enumerate() {
            if !point.close.is_finite() {
                return Err(PipelineError::Schema(format!(
                    "close at position {} is not a finite number",
                    i
                )));
            }
            if let Some(ts) = point.timestamp {
                if let Some(prev) = previous {
                    if ts <= prev {
                        return Err(PipelineError::Schema(format!(
                            "timestamps must be strictly increasing: {} follows {} at position {}",
                            ts, prev, i
                        )));
                    }
                }
                previous = Some(ts);
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn last_n(&self, n: usize) -> &[PricePoint] {
        let len = self.points.len();
        if n >= len {
            &self.points[..]
        } else {
            &self.points[len - n..]
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    #[cfg(test)]
    pub fn from_closes(closes: &[f64]) -> Self {
        Self {
            points: closes
                .iter()
                .map(|&close| PricePoint { timestamp: None, close })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 1, d).and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    #[test]
    fn test_accepts_increasing_timestamps() {
        let series = RawSeries::new(vec![
            PricePoint { timestamp: day(2), close: 10.0 },
            PricePoint { timestamp: day(3), close: 11.0 },
            PricePoint { timestamp: None, close: 12.0 },
            PricePoint { timestamp: day(5), close: 13.0 },
        ])
        .unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.closes(), vec![10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_rejects_repeated_timestamp() {
        let err = RawSeries::new(vec![
            PricePoint { timestamp: day(2), close: 10.0 },
            PricePoint { timestamp: day(2), close: 11.0 },
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_rejects_non_finite_close() {
        let err = RawSeries::new(vec![PricePoint { timestamp: None, close: f64::NAN }]).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_last_n() {
        let series = RawSeries::from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let tail: Vec<f64> = series.last_n(2).iter().map(|p| p.close).collect();
        assert_eq!(tail, vec![3.0, 4.0]);
        assert_eq!(series.last_n(10).len(), 4);
        assert_eq!(series.last().map(|p| p.close), Some(4.0));
    }
}
