//! Causal rolling-window statistics
//!
//! Every function here looks only at the trailing window ending at the
//! current row and uses a minimum of one observation, so partial windows at
//! the start of a series still produce a value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LobError, Result};

/// Rolling operation applied over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingOp {
    Mean,
    Std,
    Var,
}

impl RollingOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollingOp::Mean => "mean",
            RollingOp::Std => "std",
            RollingOp::Var => "var",
        }
    }

    /// Apply this operation over `values` with the given window
    pub fn apply(&self, values: &[f64], window: usize) -> Result<Vec<f64>> {
        match self {
            RollingOp::Mean => rolling_mean(values, window),
            RollingOp::Std => Ok(fill_dispersion(&rolling_std(values, window)?)),
            RollingOp::Var => Ok(fill_dispersion(&rolling_var(values, window)?)),
        }
    }
}

impl fmt::Display for RollingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(LobError::Transform(
            "rolling window must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Index range of the trailing window ending at `i`
fn window_bounds(i: usize, window: usize) -> std::ops::Range<usize> {
    (i + 1).saturating_sub(window)..i + 1
}

/// NaN-skipping values of one window
fn observed(slice: &[f64]) -> impl Iterator<Item = f64> + '_ {
    slice.iter().copied().filter(|v| !v.is_nan())
}

/// Rolling sum, NaN when the window holds no observation
pub fn rolling_sum(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window)?;
    Ok((0..values.len())
        .map(|i| {
            let slice = &values[window_bounds(i, window)];
            let mut seen = false;
            let sum = observed(slice).fold(0.0, |acc, v| {
                seen = true;
                acc + v
            });
            if seen {
                sum
            } else {
                f64::NAN
            }
        })
        .collect())
}

/// Rolling arithmetic mean
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window)?;
    Ok((0..values.len())
        .map(|i| {
            let slice = &values[window_bounds(i, window)];
            let (sum, count) = observed(slice).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect())
}

/// Rolling sample variance (ddof = 1); NaN for windows with one observation
pub fn rolling_var(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window)?;
    Ok((0..values.len())
        .map(|i| {
            let slice = &values[window_bounds(i, window)];
            let (sum, count) = observed(slice).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            if count < 2 {
                return f64::NAN;
            }
            let mean = sum / count as f64;
            let ss: f64 = observed(slice).map(|v| (v - mean).powi(2)).sum();
            ss / (count - 1) as f64
        })
        .collect())
}

/// Rolling sample standard deviation
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<f64>> {
    Ok(rolling_var(values, window)?
        .into_iter()
        .map(f64::sqrt)
        .collect())
}

/// Backfill a std/var series; anything still undefined (a window of one
/// row never has a defined sample dispersion) becomes zero.
fn fill_dispersion(values: &[f64]) -> Vec<f64> {
    backfill(values)
        .into_iter()
        .map(|v| if v.is_nan() { 0.0 } else { v })
        .collect()
}

/// Replace each NaN with the next defined value.
///
/// Trailing NaNs with nothing after them stay NaN.
pub fn backfill(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut next = f64::NAN;
    for v in out.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "expected {e}, got {a}");
        }
    }

    #[test]
    fn test_rolling_mean_partial_windows() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_close(&out, &[1.0, 1.5, 2.0, 3.0]);
    }

    #[test]
    fn test_rolling_sum() {
        let out = rolling_sum(&[1.0, -2.0, 3.0, 4.0], 2).unwrap();
        assert_close(&out, &[1.0, -1.0, 1.0, 7.0]);
    }

    #[test]
    fn test_rolling_var_is_sample_variance() {
        let out = rolling_var(&[2.0, 4.0, 6.0], 3).unwrap();
        assert!(out[0].is_nan());
        assert_close(&out[1..], &[2.0, 4.0]);
    }

    #[test]
    fn test_std_and_var_are_backfilled() {
        let values = [2.0, 4.0, 6.0, 5.0];
        for op in [RollingOp::Std, RollingOp::Var] {
            let out = op.apply(&values, 2).unwrap();
            assert!(out.iter().all(|v| !v.is_nan()), "{op} left a NaN");
            assert_eq!(out[0], out[1]);
        }
    }

    #[test]
    fn test_window_one_dispersion_has_no_nan() {
        for op in [RollingOp::Std, RollingOp::Var] {
            let out = op.apply(&[1.0, 2.0, 3.0], 1).unwrap();
            assert_eq!(out, vec![0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_causality() {
        let base = [1.0, 5.0, 2.0, 8.0, 3.0];
        let mut changed = base;
        changed[4] = 100.0;

        for op in [RollingOp::Mean, RollingOp::Std, RollingOp::Var] {
            let a = op.apply(&base, 3).unwrap();
            let b = op.apply(&changed, 3).unwrap();
            // Row 0 for std/var is backfilled from row 1, still inside rows 0..=3.
            assert_close(&a[..4], &b[..4]);
        }
    }

    #[test]
    fn test_zero_window_is_an_error() {
        assert!(rolling_mean(&[1.0], 0).is_err());
        assert!(RollingOp::Var.apply(&[1.0], 0).is_err());
    }

    #[test]
    fn test_backfill_trailing_nan_kept() {
        let out = backfill(&[f64::NAN, 1.0, f64::NAN]);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 1.0);
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_op_display() {
        assert_eq!(RollingOp::Mean.to_string(), "mean");
        assert_eq!(RollingOp::Var.as_str(), "var");
    }
}
