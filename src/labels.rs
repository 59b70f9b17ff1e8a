//! Caller-facing label representations.

use crate::{CsrMatrix, Error, Result};

/// Labels in the caller's own label space.
///
/// Predictions are returned in the same variant the model was fitted with.
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    /// One numeric label per sample (binary `{-1, 1}` / `{0, 1}`, or class values).
    Numeric(Vec<f32>),
    /// Dense one-hot matrix, row-major `(len, width)`.
    OneHot { values: Vec<f32>, width: usize },
    /// Sparse one-hot matrix.
    Sparse(CsrMatrix),
    /// Arbitrary string categories.
    Categorical(Vec<String>),
}

/// A comparable view of one decoded label.
///
/// Matrix rows compare by their arg-max column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelKey<'a> {
    Number(f32),
    Text(&'a str),
    Column(usize),
}

impl Labels {
    /// Dense one-hot labels from per-sample rows.
    pub fn one_hot_from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(Error::UnsupportedLabelFormat(
                "one-hot labels need at least one row and one column".to_owned(),
            ));
        }
        if let Some(i) = rows.iter().position(|r| r.len() != width) {
            return Err(Error::UnsupportedLabelFormat(format!(
                "one-hot row {i} has len {}, expected {width}",
                rows[i].len()
            )));
        }
        Ok(Labels::OneHot {
            values: rows.concat(),
            width,
        })
    }

    pub fn categorical<S: AsRef<str>>(labels: &[S]) -> Self {
        Labels::Categorical(labels.iter().map(|s| s.as_ref().to_owned()).collect())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Labels::Numeric(v) => v.len(),
            Labels::OneHot { values, width } => values.len() / (*width).max(1),
            Labels::Sparse(m) => m.rows(),
            Labels::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Labels::Numeric(_) => "numeric",
            Labels::OneHot { .. } => "dense one-hot",
            Labels::Sparse(_) => "sparse one-hot",
            Labels::Categorical(_) => "categorical",
        }
    }

    /// One comparable key per sample.
    pub fn keys(&self) -> Vec<LabelKey<'_>> {
        match self {
            Labels::Numeric(v) => v.iter().map(|&x| LabelKey::Number(x)).collect(),
            Labels::Categorical(v) => v.iter().map(|s| LabelKey::Text(s.as_str())).collect(),
            Labels::OneHot { values, width } => values
                .chunks_exact((*width).max(1))
                .map(|row| LabelKey::Column(argmax(row)))
                .collect(),
            Labels::Sparse(m) => {
                let mut buf = vec![0.0_f32; m.cols()];
                (0..m.rows())
                    .map(|r| {
                        m.densify_row(r, &mut buf);
                        LabelKey::Column(argmax(&buf))
                    })
                    .collect()
            }
        }
    }
}

impl From<Vec<f32>> for Labels {
    fn from(values: Vec<f32>) -> Self {
        Labels::Numeric(values)
    }
}

impl From<CsrMatrix> for Labels {
    fn from(matrix: CsrMatrix) -> Self {
        Labels::Sparse(matrix)
    }
}

/// Index of the first maximum. NaN entries never win.
#[inline]
pub(crate) fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate().skip(1) {
        if v > row[best] || row[best].is_nan() {
            best = i;
        }
    }
    best
}
