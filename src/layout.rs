//! Decision vector bookkeeping.
//!
//! The decision vector holds one block per piece. Inside a piece block the control points are
//! grouped by dimension (`[x_0 .. x_n, y_0 .. y_n, ...]`), which is what the per-dimension
//! boundary, continuity and cost algebra wants. Corridor rows act on one control point across
//! all dimensions at once and are naturally written interleaved (`[x_0, y_0, x_1, y_1, ...]`);
//! the mapping between the two is an index permutation applied on the fly.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    dims: usize,
    order: usize,
    steps: usize,
}

impl Layout {
    pub fn new(dims: usize, order: usize, steps: usize) -> Layout {
        Layout { dims, order, steps }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Variables per piece
    pub fn piece_len(&self) -> usize {
        self.dims * self.order
    }

    /// Size of the whole decision vector
    pub fn len(&self) -> usize {
        self.piece_len() * self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of a piece's block
    pub fn piece_offset(&self, step: usize) -> usize {
        step * self.piece_len()
    }

    /// Global index of control point `ctrl` of piece `step` along dimension `dim`
    pub fn index(&self, step: usize, dim: usize, ctrl: usize) -> usize {
        self.piece_offset(step) + dim * self.order + ctrl
    }

    /// Maps a piece-local interleaved index (`ctrl * dims + dim`) to the grouped one
    pub fn grouped_from_interleaved(&self, local: usize) -> usize {
        let (ctrl, dim) = (local / self.dims, local % self.dims);
        dim * self.order + ctrl
    }

    /// Maps a piece-local grouped index (`dim * order + ctrl`) to the interleaved one
    pub fn interleaved_from_grouped(&self, local: usize) -> usize {
        let (dim, ctrl) = (local / self.order, local % self.order);
        ctrl * self.dims + dim
    }

    /// Control points of one piece as an `order × dims` matrix, one point per row
    pub fn control_points(&self, x: &DVector<f64>, step: usize) -> DMatrix<f64> {
        let offset = self.piece_offset(step);
        let mut points = DMatrix::zeros(self.order, self.dims);
        for local in 0..self.piece_len() {
            let interleaved = self.interleaved_from_grouped(local);
            points[(interleaved / self.dims, interleaved % self.dims)] = x[offset + local];
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        let layout = Layout::new(3, 6, 4);
        assert_eq!(18, layout.piece_len());
        assert_eq!(72, layout.len());
        assert!(!layout.is_empty());
        assert_eq!(36, layout.piece_offset(2));
        assert_eq!(36 + 6 + 5, layout.index(2, 1, 5));
    }

    #[test]
    fn permutation_round_trip() {
        let layout = Layout::new(3, 4, 1);
        let mut seen = vec![false; layout.piece_len()];
        for local in 0..layout.piece_len() {
            let grouped = layout.grouped_from_interleaved(local);
            assert_eq!(local, layout.interleaved_from_grouped(grouped));
            seen[grouped] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn interleaved_point_lands_in_dimension_blocks() {
        let layout = Layout::new(2, 4, 1);
        // control point 1, y coordinate
        assert_eq!(4 + 1, layout.grouped_from_interleaved(3));
        // control point 3, x coordinate
        assert_eq!(3, layout.grouped_from_interleaved(3 * 2));
    }

    #[test]
    fn control_points_of_piece() {
        let layout = Layout::new(2, 3, 2);
        let x = DVector::from_fn(layout.len(), |i, _| i as f64);
        let points = layout.control_points(&x, 1);
        assert_eq!(
            DMatrix::from_row_slice(3, 2, &[6.0, 9.0, 7.0, 10.0, 8.0, 11.0]),
            points
        );
    }
}
