//! Feature and target containers.
//!
//! `Inputs` stores features contiguously (row-major). `CsrMatrix` is a compressed
//! sparse row matrix used for sparse features and sparse one-hot labels.
//! `Targets` is the encoded target matrix handed to the objective; sparse targets
//! stay sparse and are densified one row at a time.

use crate::{Error, Result};

/// A collection of input samples (X).
///
/// Stored as a contiguous buffer with row-major layout:
/// - `inputs.len() == len * input_dim`
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    inputs: Vec<f32>,
    len: usize,
    input_dim: usize,
}

impl Inputs {
    /// Build inputs from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(inputs: Vec<f32>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if !inputs.len().is_multiple_of(input_dim) {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {}",
                inputs.len(),
                input_dim
            )));
        }
        if inputs.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "inputs must contain only finite values".to_owned(),
            ));
        }

        let len = inputs.len() / input_dim;

        Ok(Self {
            inputs,
            len,
            input_dim,
        })
    }

    /// Build inputs from per-sample rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }

        let input_dim = rows[0].len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != input_dim {
                return Err(Error::InvalidData(format!(
                    "input row {i} has len {}, expected {input_dim}",
                    row.len()
                )));
            }
        }

        Self::from_flat(rows.concat(), input_dim)
    }

    /// Densify sparse features.
    ///
    /// Networks consume dense rows, so sparse features are expanded here once.
    pub fn from_csr(matrix: &CsrMatrix) -> Result<Self> {
        let mut flat = vec![0.0_f32; matrix.rows() * matrix.cols()];
        for (r, row) in flat.chunks_exact_mut(matrix.cols()).enumerate() {
            matrix.densify_row(r, row);
        }
        Self::from_flat(flat, matrix.cols())
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[f32] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }
}

/// Compressed sparse row matrix.
///
/// Row `r` holds the entries `indices[indptr[r]..indptr[r + 1]]` (column ids, strictly
/// increasing) with matching `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    /// Build from raw CSR buffers, validating the structure.
    pub fn new(
        rows: usize,
        cols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f32>,
    ) -> Result<Self> {
        if cols == 0 {
            return Err(Error::InvalidData("sparse matrix must have cols > 0".to_owned()));
        }
        if indptr.len() != rows + 1 || indptr.first() != Some(&0) {
            return Err(Error::InvalidData(format!(
                "indptr must have len rows + 1 ({}) and start at 0",
                rows + 1
            )));
        }
        if indices.len() != values.len() || indptr[rows] != indices.len() {
            return Err(Error::InvalidData(format!(
                "indices ({}) / values ({}) do not match indptr end {}",
                indices.len(),
                values.len(),
                indptr[rows]
            )));
        }
        for r in 0..rows {
            let (start, end) = (indptr[r], indptr[r + 1]);
            if start > end {
                return Err(Error::InvalidData(format!("indptr decreases at row {r}")));
            }
            let row = &indices[start..end];
            if row.iter().any(|&c| c >= cols) || row.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::InvalidData(format!(
                    "row {r} column indices must be increasing and < {cols}"
                )));
            }
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "sparse values must be finite".to_owned(),
            ));
        }

        Ok(Self {
            rows,
            cols,
            indptr,
            indices,
            values,
        })
    }

    /// Build from dense rows, keeping only non-zero entries.
    pub fn from_dense_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidData(format!(
                    "row {r} has len {}, expected {cols}",
                    row.len()
                )));
            }
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(c);
                    values.push(v);
                }
            }
            indptr.push(indices.len());
        }
        Self::new(rows.len(), cols, indptr, indices, values)
    }

    /// Build from `(row, col, value)` triplets. Duplicates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        triplets: &[(usize, usize, f32)],
    ) -> Result<Self> {
        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0; rows + 1];
        let mut indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f32> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            if r >= rows || c >= cols {
                return Err(Error::InvalidData(format!(
                    "triplet ({r}, {c}) out of bounds for {rows}x{cols}"
                )));
            }
            if last == Some((r, c)) {
                if let Some(acc) = values.last_mut() {
                    *acc += v;
                }
                continue;
            }
            indices.push(c);
            values.push(v);
            indptr[r + 1] += 1;
            last = Some((r, c));
        }
        for r in 0..rows {
            indptr[r + 1] += indptr[r];
        }
        Self::new(rows, cols, indptr, indices, values)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column ids and values of row `r`.
    ///
    /// Panics if `r >= rows`.
    #[inline]
    pub fn row(&self, r: usize) -> (&[usize], &[f32]) {
        let (start, end) = (self.indptr[r], self.indptr[r + 1]);
        (&self.indices[start..end], &self.values[start..end])
    }

    /// Write row `r` into a dense buffer of length `cols`.
    #[inline]
    pub fn densify_row(&self, r: usize, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.cols);
        out.fill(0.0);
        let (cols, vals) = self.row(r);
        for (&c, &v) in cols.iter().zip(vals) {
            out[c] = v;
        }
    }

    pub fn to_dense_rows(&self) -> Vec<Vec<f32>> {
        (0..self.rows)
            .map(|r| {
                let mut row = vec![0.0; self.cols];
                self.densify_row(r, &mut row);
                row
            })
            .collect()
    }
}

/// Encoded target matrix with shape `(len, width)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Dense { values: Vec<f32>, width: usize },
    Sparse(CsrMatrix),
}

impl Targets {
    pub fn dense(values: Vec<f32>, width: usize) -> Result<Self> {
        if width == 0 || !values.len().is_multiple_of(width) {
            return Err(Error::Shape(format!(
                "target buffer of len {} is not a multiple of width {width}",
                values.len()
            )));
        }
        Ok(Targets::Dense { values, width })
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Targets::Dense { values, width } => values.len() / width,
            Targets::Sparse(m) => m.rows(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn width(&self) -> usize {
        match self {
            Targets::Dense { width, .. } => *width,
            Targets::Sparse(m) => m.cols(),
        }
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self, Targets::Sparse(_))
    }

    /// Borrow row `idx` densely, using `buf` as backing storage for sparse rows.
    #[inline]
    pub fn row<'a>(&'a self, idx: usize, buf: &'a mut [f32]) -> &'a [f32] {
        match self {
            Targets::Dense { values, width } => &values[idx * width..(idx + 1) * width],
            Targets::Sparse(m) => {
                m.densify_row(idx, buf);
                buf
            }
        }
    }
}
