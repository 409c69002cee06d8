//! Quadratic cost over the decision vector.
//!
//! For one piece and one dimension the cost is `Σ_d w_d ∫_0^T (f^(d)(t))² dt`, a quadratic
//! form in the monomial coefficients. It is pulled back to control points through the basis
//! matrix and repeated, uncoupled, for every piece and dimension.

use nalgebra::DMatrix;

use crate::basis::{falling_factorial, Basis};
use crate::config::CostWeights;
use crate::layout::Layout;
use crate::sparse::SparseMatrix;

/// Gram matrix of the `d`-th derivative over `[0, timescale]` in monomial coefficients:
/// `H[k][l] = ∫ (k!/(k-d)!) t^(k-d) (l!/(l-d)!) t^(l-d) dt`
pub fn monomial_hessian(order: usize, d: usize, timescale: f64) -> DMatrix<f64> {
    let mut h = DMatrix::zeros(order, order);
    for k in d..order {
        for l in d..order {
            let power = (k + l + 1 - 2 * d) as i32;
            h[(k, l)] = falling_factorial(k, d) * falling_factorial(l, d)
                * timescale.powi(power)
                / power as f64;
        }
    }
    h
}

/// Cost of one piece along one dimension as a quadratic form over its control points
pub fn piece_cost(basis: &Basis, weights: &CostWeights) -> DMatrix<f64> {
    let order = basis.order();
    let mut mono = DMatrix::zeros(order, order);
    for (d, w) in weights.terms() {
        if w != 0.0 {
            mono += monomial_hessian(order, d, basis.timescale()) * w;
        }
    }

    // c = Bᵀ p  =>  cᵀ H c = pᵀ (B H Bᵀ) p
    let m = basis.matrix();
    let q = m * mono * m.transpose();

    // roundoff correction only, the product is symmetric by construction
    (&q + q.transpose()) * 0.5
}

/// Block-diagonal cost over the whole decision vector
pub fn build_cost(layout: &Layout, basis: &Basis, weights: &CostWeights) -> SparseMatrix {
    let block = piece_cost(basis, weights);
    let mut cost = SparseMatrix::new(layout.len(), layout.len());
    for step in 0..layout.steps() {
        for dim in 0..layout.dims() {
            let offset = layout.index(step, dim, 0);
            cost.add_block(offset, offset, &block);
        }
    }
    cost
}
