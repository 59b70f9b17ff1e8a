//! Label codec.
//!
//! Converts caller-facing [`Labels`] into an encoded [`Targets`] matrix whose width
//! equals the network output width, and decodes network outputs back into labels.
//!
//! The encoding is discovered once per `fit` ([`LabelCodec::fit_encode`]) and fixed
//! afterwards. Class values and category names are kept sorted ascending, so the
//! column assignment does not depend on sample order.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::labels::argmax;
use crate::{CsrMatrix, Error, LabelKey, Labels, Result, Targets};

/// Class counts above this produce sparse one-hot targets.
pub const DENSE_CLASS_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Numeric binary label convention for scalar-output networks.
pub enum BinaryScheme {
    /// Labels in `{-1, 1}`; outputs are thresholded at 0.
    PlusMinusOne,
    /// Labels in `{0, 1}`; outputs are thresholded at 0.5.
    ZeroOne,
}

impl BinaryScheme {
    #[inline]
    pub fn low(self) -> f32 {
        match self {
            BinaryScheme::PlusMinusOne => -1.0,
            BinaryScheme::ZeroOne => 0.0,
        }
    }

    #[inline]
    pub fn high(self) -> f32 {
        1.0
    }

    #[inline]
    pub fn threshold(self) -> f32 {
        0.5 * (self.low() + self.high())
    }

    #[inline]
    fn contains(self, v: f32) -> bool {
        v == self.low() || v == self.high()
    }
}

/// How labels map onto network outputs. Fixed at the first encode of a `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LabelEncoding {
    /// Numeric binary labels passed through to a scalar output.
    Binary { scheme: BinaryScheme },
    /// Numeric class values, one-hot over `width` output columns.
    NumericClasses { classes: Vec<f32>, width: usize },
    /// Dense one-hot matrix labels.
    OneHot { width: usize },
    /// Sparse one-hot matrix labels.
    Sparse { width: usize },
    /// String categories. With `width == 1` there are exactly two categories encoded
    /// as a scalar `0`/`1` target.
    Categorical { categories: Vec<String>, width: usize },
}

impl LabelEncoding {
    /// Encoded target width (the network output width).
    pub fn width(&self) -> usize {
        match self {
            LabelEncoding::Binary { .. } => 1,
            LabelEncoding::NumericClasses { width, .. }
            | LabelEncoding::OneHot { width }
            | LabelEncoding::Sparse { width }
            | LabelEncoding::Categorical { width, .. } => *width,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            LabelEncoding::Binary { .. } => "binary",
            LabelEncoding::NumericClasses { .. } => "numeric_classes",
            LabelEncoding::OneHot { .. } => "one_hot",
            LabelEncoding::Sparse { .. } => "sparse",
            LabelEncoding::Categorical { .. } => "categorical",
        }
    }

    /// Discover the encoding for `labels` against a network with `output_dim` outputs.
    pub fn discover(labels: &Labels, output_dim: usize, one_hot: bool) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidData("labels must not be empty".to_owned()));
        }

        match labels {
            Labels::Numeric(values) => {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(Error::UnsupportedLabelFormat(
                        "numeric labels must be finite".to_owned(),
                    ));
                }
                if output_dim == 1 {
                    if one_hot {
                        return Err(Error::Shape(
                            "one-hot encoding needs one output per class, network has 1 output"
                                .to_owned(),
                        ));
                    }
                    let scheme = if values.iter().any(|&v| v < 0.0) {
                        BinaryScheme::PlusMinusOne
                    } else {
                        BinaryScheme::ZeroOne
                    };
                    if let Some(v) = values.iter().find(|&&v| !scheme.contains(v)) {
                        return Err(Error::UnsupportedLabelFormat(format!(
                            "scalar output expects binary labels in {{{}, {}}}, found {v}",
                            scheme.low(),
                            scheme.high()
                        )));
                    }
                    return Ok(LabelEncoding::Binary { scheme });
                }

                let mut classes = values.clone();
                classes.sort_by(f32::total_cmp);
                classes.dedup();
                check_class_count(classes.len(), output_dim, one_hot)?;
                Ok(LabelEncoding::NumericClasses {
                    classes,
                    width: output_dim,
                })
            }
            Labels::OneHot { width, .. } => {
                check_matrix_width(*width, output_dim)?;
                Ok(LabelEncoding::OneHot { width: *width })
            }
            Labels::Sparse(m) => {
                check_matrix_width(m.cols(), output_dim)?;
                Ok(LabelEncoding::Sparse { width: m.cols() })
            }
            Labels::Categorical(values) => {
                let categories: Vec<String> = values
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                if output_dim == 1 {
                    if one_hot || categories.len() != 2 {
                        return Err(Error::Shape(format!(
                            "{} categories cannot be encoded on a single output{}",
                            categories.len(),
                            if one_hot { " with one-hot encoding" } else { "" }
                        )));
                    }
                } else {
                    check_class_count(categories.len(), output_dim, one_hot)?;
                }
                Ok(LabelEncoding::Categorical {
                    categories,
                    width: output_dim,
                })
            }
        }
    }
}

fn check_class_count(classes: usize, output_dim: usize, one_hot: bool) -> Result<()> {
    if one_hot && classes != output_dim {
        return Err(Error::Shape(format!(
            "one-hot width {classes} does not match network output width {output_dim}"
        )));
    }
    if classes > output_dim {
        return Err(Error::Shape(format!(
            "{classes} classes do not fit in network output width {output_dim}"
        )));
    }
    Ok(())
}

fn check_matrix_width(width: usize, output_dim: usize) -> Result<()> {
    if width != output_dim {
        return Err(Error::Shape(format!(
            "label matrix width {width} does not match network output width {output_dim}"
        )));
    }
    Ok(())
}

/// Label encoding state of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelCodec {
    encoding: Option<LabelEncoding>,
}

impl LabelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_encoding(encoding: LabelEncoding) -> Self {
        Self {
            encoding: Some(encoding),
        }
    }

    pub fn encoding(&self) -> Option<&LabelEncoding> {
        self.encoding.as_ref()
    }

    fn fixed(&self) -> Result<&LabelEncoding> {
        self.encoding.as_ref().ok_or(Error::NotFitted)
    }

    /// Rediscover the encoding from `labels` and encode them.
    ///
    /// Any previous mapping is replaced, but only once encoding has succeeded.
    pub fn fit_encode(
        &mut self,
        labels: &Labels,
        output_dim: usize,
        one_hot: bool,
    ) -> Result<Targets> {
        let encoding = LabelEncoding::discover(labels, output_dim, one_hot)?;
        let targets = encode_with(&encoding, labels)?;
        self.encoding = Some(encoding);
        Ok(targets)
    }

    /// Encode with the fixed mapping.
    ///
    /// Fails with `UnknownCategory` for classes that were not seen at fit time.
    pub fn encode(&self, labels: &Labels) -> Result<Targets> {
        encode_with(self.fixed()?, labels)
    }

    /// Bring ground-truth labels into the fitted label space.
    ///
    /// One-hot matrices (dense or sparse) given to a binary, numeric-class or
    /// categorical model are decoded by their arg-max column. Everything else is
    /// returned as is.
    pub fn decode_truth<'a>(&self, labels: &'a Labels) -> Result<Cow<'a, Labels>> {
        let encoding = self.fixed()?;
        let cols = match labels {
            Labels::OneHot { width, .. } => *width,
            Labels::Sparse(m) => m.cols(),
            Labels::Numeric(_) | Labels::Categorical(_) => return Ok(Cow::Borrowed(labels)),
        };
        let expected = match encoding {
            LabelEncoding::OneHot { .. } | LabelEncoding::Sparse { .. } => {
                return Ok(Cow::Borrowed(labels));
            }
            LabelEncoding::Binary { .. } => 2,
            LabelEncoding::Categorical { width: 1, .. } => 2,
            LabelEncoding::NumericClasses { width, .. }
            | LabelEncoding::Categorical { width, .. } => *width,
        };
        if cols != expected {
            return Err(Error::Shape(format!(
                "label matrix width {cols} does not match the {} encoding width {expected}",
                encoding.mode()
            )));
        }

        let columns: Vec<usize> = labels
            .keys()
            .into_iter()
            .filter_map(|key| match key {
                LabelKey::Column(c) => Some(c),
                LabelKey::Number(_) | LabelKey::Text(_) => None,
            })
            .collect();
        let lookup = |c: usize, len: usize| {
            if c < len {
                Ok(c)
            } else {
                Err(Error::UnknownCategory(format!("column {c}")))
            }
        };

        let decoded = match encoding {
            LabelEncoding::Binary { scheme } => Labels::Numeric(
                columns
                    .iter()
                    .map(|&c| if c == 0 { scheme.low() } else { scheme.high() })
                    .collect(),
            ),
            LabelEncoding::NumericClasses { classes, .. } => Labels::Numeric(
                columns
                    .iter()
                    .map(|&c| lookup(c, classes.len()).map(|i| classes[i]))
                    .collect::<Result<_>>()?,
            ),
            LabelEncoding::Categorical { categories, .. } => Labels::Categorical(
                columns
                    .iter()
                    .map(|&c| lookup(c, categories.len()).map(|i| categories[i].clone()))
                    .collect::<Result<_>>()?,
            ),
            LabelEncoding::OneHot { .. } | LabelEncoding::Sparse { .. } => {
                return Ok(Cow::Borrowed(labels));
            }
        };
        Ok(Cow::Owned(decoded))
    }

    /// Decode flat `(n, width)` network outputs into labels.
    pub fn decode(&self, outputs: &[f32]) -> Result<Labels> {
        let encoding = self.fixed()?;
        let width = encoding.width();
        if !outputs.len().is_multiple_of(width) {
            return Err(Error::Shape(format!(
                "outputs len {} is not a multiple of encoded width {width}",
                outputs.len()
            )));
        }
        let rows = outputs.chunks_exact(width);

        let labels = match encoding {
            LabelEncoding::Binary { scheme } => Labels::Numeric(
                rows.map(|row| {
                    if row[0] >= scheme.threshold() {
                        scheme.high()
                    } else {
                        scheme.low()
                    }
                })
                .collect(),
            ),
            LabelEncoding::NumericClasses { classes, .. } => Labels::Numeric(
                rows.map(|row| classes[argmax(&row[..classes.len()])])
                    .collect(),
            ),
            LabelEncoding::OneHot { width } => {
                let mut values = vec![0.0_f32; outputs.len()];
                for (row, out) in rows.zip(values.chunks_exact_mut(*width)) {
                    out[argmax(row)] = 1.0;
                }
                Labels::OneHot {
                    values,
                    width: *width,
                }
            }
            LabelEncoding::Sparse { width } => {
                let n = outputs.len() / width;
                let indices: Vec<usize> = rows.map(argmax).collect();
                Labels::Sparse(CsrMatrix::new(
                    n,
                    *width,
                    (0..=n).collect(),
                    indices,
                    vec![1.0; n],
                )?)
            }
            LabelEncoding::Categorical { categories, width } => Labels::Categorical(
                rows.map(|row| {
                    let idx = if *width == 1 {
                        usize::from(row[0] >= 0.5)
                    } else {
                        argmax(&row[..categories.len()])
                    };
                    categories[idx].clone()
                })
                .collect(),
            ),
        };
        Ok(labels)
    }
}

fn encode_with(encoding: &LabelEncoding, labels: &Labels) -> Result<Targets> {
    let mismatch = || {
        Error::UnsupportedLabelFormat(format!(
            "{} labels cannot be encoded with the fitted {} encoding",
            labels.kind(),
            encoding.mode()
        ))
    };

    match (encoding, labels) {
        (LabelEncoding::Binary { scheme }, Labels::Numeric(values)) => {
            if let Some(v) = values.iter().find(|&&v| !scheme.contains(v)) {
                return Err(Error::UnknownCategory(v.to_string()));
            }
            Targets::dense(values.clone(), 1)
        }
        (LabelEncoding::NumericClasses { classes, width }, Labels::Numeric(values)) => {
            let indices = values
                .iter()
                .map(|v| {
                    classes
                        .iter()
                        .position(|c| c == v)
                        .ok_or_else(|| Error::UnknownCategory(v.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            one_hot_targets(&indices, *width)
        }
        (LabelEncoding::OneHot { width }, Labels::OneHot { values, width: w }) => {
            check_matrix_width(*w, *width)?;
            Targets::dense(values.clone(), *width)
        }
        (LabelEncoding::OneHot { width }, Labels::Sparse(m)) => {
            check_matrix_width(m.cols(), *width)?;
            Targets::dense(m.to_dense_rows().concat(), *width)
        }
        (LabelEncoding::Sparse { width }, Labels::Sparse(m)) => {
            check_matrix_width(m.cols(), *width)?;
            Ok(Targets::Sparse(m.clone()))
        }
        (LabelEncoding::Sparse { width }, Labels::OneHot { values, width: w }) => {
            check_matrix_width(*w, *width)?;
            let rows: Vec<Vec<f32>> = values.chunks_exact(*w).map(<[f32]>::to_vec).collect();
            Ok(Targets::Sparse(CsrMatrix::from_dense_rows(&rows)?))
        }
        (LabelEncoding::Categorical { categories, width }, Labels::Categorical(values)) => {
            let indices = values
                .iter()
                .map(|v| {
                    categories
                        .binary_search(v)
                        .map_err(|_| Error::UnknownCategory(v.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            if *width == 1 {
                Targets::dense(indices.iter().map(|&i| i as f32).collect(), 1)
            } else {
                one_hot_targets(&indices, *width)
            }
        }
        _ => Err(mismatch()),
    }
}

/// One-hot rows for class indices; sparse once the class count gets large.
fn one_hot_targets(indices: &[usize], width: usize) -> Result<Targets> {
    if width > DENSE_CLASS_LIMIT {
        let n = indices.len();
        return Ok(Targets::Sparse(CsrMatrix::new(
            n,
            width,
            (0..=n).collect(),
            indices.to_vec(),
            vec![1.0; n],
        )?));
    }
    let mut values = vec![0.0_f32; indices.len() * width];
    for (row, &idx) in values.chunks_exact_mut(width).zip(indices) {
        row[idx] = 1.0;
    }
    Targets::dense(values, width)
}
