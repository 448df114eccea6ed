use ndarray::{s, Array1, Array2, ArrayView1};
use std::io::Write;

use crate::error::{PipelineError, Result};

/// Windows and next-value targets ready for a model.
///
/// Row `i` of `inputs` holds `series[i..i + window_size]`; `targets[i]` is
/// `series[i + window_size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    pub inputs: Array2<f64>,
    pub targets: Array1<f64>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn window(&self, i: usize) -> ArrayView1<'_, f64> {
        self.inputs.row(i)
    }

    /// Rows `[start, end)` as a new set.
    pub fn slice(&self, start: usize, end: usize) -> WindowSet {
        WindowSet {
            inputs: self.inputs.slice(s![start..end, ..]).to_owned(),
            targets: self.targets.slice(s![start..end]).to_owned(),
        }
    }

    /// Write one row per window: `t0..t{w-1}` followed by `target`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header: Vec<String> = (0..self.window_size()).map(|i| format!("t{}", i)).collect();
        header.push("target".to_string());
        wtr.write_record(&header)?;

        for i in 0..self.len() {
            let row = self.window(i);
            let record = row
                .iter()
                .chain(std::iter::once(&self.targets[i]))
                .map(|v| v.to_string());
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn check_window_size(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(PipelineError::Config("window_size must be > 0".to_string()));
    }
    Ok(())
}

/// Stride-1 sliding windows over the whole series.
pub fn make_training_windows(series: &[f64], window_size: usize) -> Result<WindowSet> {
    check_window_size(window_size)?;
    if series.len() <= window_size {
        return Err(PipelineError::InsufficientWindow {
            len: series.len(),
            window_size,
            purpose: "training",
        });
    }

    let count = series.len() - window_size;
    let mut inputs = Array2::<f64>::zeros((count, window_size));
    for i in 0..count {
        inputs
            .row_mut(i)
            .assign(&ArrayView1::from(&series[i..i + window_size]));
    }
    let targets = Array1::from(series[window_size..].to_vec());

    Ok(WindowSet { inputs, targets })
}

/// The single trailing window used for a prediction, shaped `(1, window_size)`.
pub fn make_serving_window(series: &[f64], window_size: usize) -> Result<Array2<f64>> {
    check_window_size(window_size)?;
    if series.len() < window_size {
        return Err(PipelineError::InsufficientWindow {
            len: series.len(),
            window_size,
            purpose: "serving",
        });
    }

    let tail = series[series.len() - window_size..].to_vec();
    Array2::from_shape_vec((1, window_size), tail)
        .map_err(|e| PipelineError::Model(format!("cannot shape serving window: {}", e)))
}

fn split_index(n: usize, validation_split: f64) -> usize {
    (n as f64 * (1.0 - validation_split)).floor() as usize
}

/// Smallest window count that leaves both sides of the split non-empty.
pub fn min_split_windows(validation_split: f64) -> Result<usize> {
    if !(validation_split > 0.0 && validation_split < 1.0) || 1.0 - validation_split >= 1.0 {
        return Err(PipelineError::Config(format!(
            "validation_split must be in (0, 1), got {}",
            validation_split
        )));
    }

    let mut n = (1.0 / (1.0 - validation_split)).ceil().max(1.0) as usize;
    while split_index(n, validation_split) == 0 {
        n += 1;
    }
    while n > 1 && split_index(n - 1, validation_split) >= 1 {
        n -= 1;
    }
    Ok(n)
}

/// Split windows in time order: the last `validation_split` fraction becomes
/// validation. Rows are never reordered.
pub fn chronological_split(windows: &WindowSet, validation_split: f64) -> Result<(WindowSet, WindowSet)> {
    let required = min_split_windows(validation_split)?;

    let n = windows.len();
    let split_index = split_index(n, validation_split);
    if n < required || split_index == 0 || split_index >= n {
        return Err(PipelineError::InsufficientSplit {
            windows: n,
            required,
            validation_split,
        });
    }

    Ok((windows.slice(0, split_index), windows.slice(split_index, n)))
}
