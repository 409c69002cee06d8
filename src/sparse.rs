//! Triplet matrix used to assemble the QP without materializing dense intermediates.

use nalgebra::{DMatrix, DVector};

/// Sparse matrix stored as `(row, col, value)` triplets.
///
/// Duplicate entries are summed when the matrix is read back.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrix {
    pub fn new(nrows: usize, ncols: usize) -> SparseMatrix {
        SparseMatrix {
            nrows,
            ncols,
            triplets: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Adds `value` at `(row, col)`, exact zeros are not stored
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows && col < self.ncols, "({}, {}) out of bounds", row, col);
        if value != 0.0 {
            self.triplets.push((row, col, value));
        }
    }

    /// Appends a new row built from `(col, value)` entries and returns its index
    pub fn push_row<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let row = self.nrows;
        self.nrows += 1;
        for (col, value) in entries {
            self.push(row, col, value);
        }
        row
    }

    /// Adds a dense block with its top-left corner at `(row, col)`
    pub fn add_block(&mut self, row: usize, col: usize, block: &DMatrix<f64>) {
        for j in 0..block.ncols() {
            for i in 0..block.nrows() {
                self.push(row + i, col + j, block[(i, j)]);
            }
        }
    }

    /// Stacks the rows of `other` below this matrix
    pub fn append_rows(&mut self, other: &SparseMatrix) {
        assert_eq!(self.ncols, other.ncols, "column count mismatch when stacking rows");
        let offset = self.nrows;
        self.triplets.extend(other.triplets.iter().map(|&(r, c, v)| (r + offset, c, v)));
        self.nrows += other.nrows;
    }

    /// Entries sorted column-major with duplicates merged and cancellations dropped
    pub fn compressed(&self) -> Vec<(usize, usize, f64)> {
        let mut sorted = self.triplets.clone();
        sorted.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(sorted.len());
        for (r, c, v) in sorted {
            match merged.last_mut() {
                Some(last) if last.0 == r && last.1 == c => last.2 += v,
                _ => merged.push((r, c, v)),
            }
        }
        merged.retain(|e| e.2 != 0.0);
        merged
    }

    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut y = DVector::zeros(self.nrows);
        for &(r, c, v) in &self.triplets {
            y[r] += v * x[c];
        }
        y
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.nrows, self.ncols);
        for &(r, c, v) in &self.triplets {
            m[(r, c)] += v;
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rows() {
        let mut m = SparseMatrix::new(0, 3);
        assert_eq!(0, m.push_row([(0, 1.0), (2, -1.0)]));
        assert_eq!(1, m.push_row([(1, 0.0)]));
        assert_eq!(2, m.nrows());
        // the explicit zero is not stored
        assert_eq!(2, m.compressed().len());
        assert_eq!(
            DMatrix::from_row_slice(2, 3, &[1.0, 0.0, -1.0, 0.0, 0.0, 0.0]),
            m.to_dense()
        );
    }

    #[test]
    fn blocks_and_duplicates() {
        let mut m = SparseMatrix::new(3, 3);
        m.add_block(1, 1, &DMatrix::from_element(2, 2, 1.0));
        m.push(1, 1, 2.0);
        m.push(2, 2, -1.0);

        let compressed = m.compressed();
        assert_eq!(
            vec![(1, 1, 3.0), (2, 1, 1.0), (1, 2, 1.0)],
            compressed
        );
        assert_eq!(3.0, m.to_dense()[(1, 1)]);
    }

    #[test]
    fn stacking() {
        let mut a = SparseMatrix::new(1, 2);
        a.push(0, 0, 1.0);
        let mut b = SparseMatrix::new(2, 2);
        b.push(1, 1, 4.0);
        a.append_rows(&b);
        assert_eq!(3, a.nrows());
        assert_eq!(4.0, a.to_dense()[(2, 1)]);
    }

    #[test]
    fn matrix_vector_product() {
        let mut m = SparseMatrix::new(2, 3);
        m.add_block(0, 0, &DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 0.0, -1.0, 0.5]));
        let y = m.mul_vec(&DVector::from_vec(vec![1.0, 1.0, 2.0]));
        assert_eq!(DVector::from_vec(vec![9.0, 0.0]), y);
    }
}
