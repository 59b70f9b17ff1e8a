//! Metrics.
//!
//! Evaluation helpers; they never take part in training.

use crate::{Error, Labels, Result};

/// Fraction of samples whose predicted label equals the true label.
///
/// Labels are compared in decoded label space via [`Labels::keys`]: numbers with
/// numbers, strings with strings, and matrix rows by their arg-max column.
pub fn accuracy(predicted: &Labels, truth: &Labels) -> Result<f32> {
    if predicted.len() != truth.len() {
        return Err(Error::Shape(format!(
            "{} predictions for {} labels",
            predicted.len(),
            truth.len()
        )));
    }
    if truth.is_empty() {
        return Err(Error::InvalidData("cannot score an empty label set".to_owned()));
    }

    let hits = predicted
        .keys()
        .into_iter()
        .zip(truth.keys())
        .filter(|(p, t)| p == t)
        .count();
    Ok(hits as f32 / truth.len() as f32)
}

/// Coefficient of determination, averaged uniformly over output columns.
///
/// Columns with zero variance score 1 when predicted exactly and 0 otherwise.
pub fn r2_score(predicted: &[f32], truth: &[f32], width: usize) -> Result<f32> {
    if predicted.len() != truth.len() {
        return Err(Error::Shape(format!(
            "predictions len {} does not match targets len {}",
            predicted.len(),
            truth.len()
        )));
    }
    if width == 0 || truth.is_empty() || !truth.len().is_multiple_of(width) {
        return Err(Error::Shape(format!(
            "targets len {} is not a non-empty multiple of width {width}",
            truth.len()
        )));
    }

    fn column(buf: &[f32], col: usize, width: usize) -> impl Iterator<Item = f64> + '_ {
        buf.iter().skip(col).step_by(width).map(|&v| f64::from(v))
    }

    let n = truth.len() / width;
    let mut total = 0.0_f64;
    for col in 0..width {
        let mean = column(truth, col, width).sum::<f64>() / n as f64;
        let ss_tot: f64 = column(truth, col, width)
            .map(|t| (t - mean) * (t - mean))
            .sum();
        let ss_res: f64 = column(predicted, col, width)
            .zip(column(truth, col, width))
            .map(|(p, t)| (p - t) * (p - t))
            .sum();

        total += if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };
    }
    Ok((total / width as f64) as f32)
}
