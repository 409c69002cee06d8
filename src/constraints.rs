//! Linear constraints over the decision vector.
//!
//! Equalities pin the start and goal waypoints (plus rest conditions) and glue consecutive
//! pieces together. Inequalities keep every control point inside its step's corridor, which
//! by the convex hull property keeps the whole piece inside.

use nalgebra::DVector;

use crate::basis::{Basis, PieceEnd};
use crate::corridor::Polytope;
use crate::layout::Layout;
use crate::sparse::SparseMatrix;

/// Position and rest conditions at both ends of the trajectory.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryConditions<'a> {
    pub start: &'a DVector<f64>,
    pub goal: &'a DVector<f64>,
    /// Derivative orders `1..=rest_derivatives` vanish at both ends
    pub rest_derivatives: usize,
}

/// Every linear constraint of the QP.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub ineq: SparseMatrix,
    pub ineq_rhs: DVector<f64>,
    pub eq: SparseMatrix,
    pub eq_rhs: DVector<f64>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl ConstraintSet {
    pub fn num_eq(&self) -> usize {
        self.eq.nrows()
    }

    pub fn num_ineq(&self) -> usize {
        self.ineq.nrows()
    }
}

/// Builds all constraints for the given layout
///
/// `corridors` holds one processed polytope per step; `lower`/`upper` are the per-dimension
/// environment bounds applied to every control point.
pub fn assemble(
    layout: &Layout,
    basis: &Basis,
    corridors: &[Polytope],
    boundary: &BoundaryConditions<'_>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> ConstraintSet {
    let (ineq, ineq_rhs) = corridor_inequalities(layout, corridors);

    let mut eq = SparseMatrix::new(0, layout.len());
    let mut rhs = Vec::new();
    boundary_equalities(layout, basis, boundary, &mut eq, &mut rhs);
    continuity_equalities(layout, basis, &mut eq, &mut rhs);

    let (lower, upper) = box_bounds(layout, lower, upper);

    ConstraintSet {
        ineq,
        ineq_rhs,
        eq,
        eq_rhs: DVector::from_vec(rhs),
        lower,
        upper,
    }
}

/// One row per (step, facet, control point): `Σ_d a_d p_k,d <= b`
pub fn corridor_inequalities(layout: &Layout, corridors: &[Polytope]) -> (SparseMatrix, DVector<f64>) {
    let dims = layout.dims();
    let mut ineq = SparseMatrix::new(0, layout.len());
    let mut rhs = Vec::new();

    for (step, corridor) in corridors.iter().enumerate() {
        let offset = layout.piece_offset(step);
        for facet in corridor.facets() {
            for ctrl in 0..layout.order() {
                // the facet acts on one point across all dimensions, i.e. interleaved indices
                let entries = facet.normal.iter().enumerate().map(|(dim, a)| {
                    let local = layout.grouped_from_interleaved(ctrl * dims + dim);
                    (offset + local, *a)
                });
                ineq.push_row(entries);
                rhs.push(facet.offset);
            }
        }
    }

    (ineq, DVector::from_vec(rhs))
}

/// Start and goal position plus the vanishing derivatives at both ends
pub fn boundary_equalities(
    layout: &Layout,
    basis: &Basis,
    boundary: &BoundaryConditions<'_>,
    eq: &mut SparseMatrix,
    rhs: &mut Vec<f64>,
) {
    if layout.steps() == 0 {
        return;
    }
    // derivatives above the degree vanish identically
    let orders = boundary.rest_derivatives.min(basis.degree()).min(basis.continuity());
    let last = layout.steps() - 1;

    let ends = [
        (0, PieceEnd::Start, boundary.start),
        (last, PieceEnd::End, boundary.goal),
    ];
    for (step, end, waypoint) in ends {
        for dim in 0..layout.dims() {
            let col = layout.index(step, dim, 0);
            for d in 0..=orders {
                let row = basis.projection(end, d);
                eq.push_row(row.iter().enumerate().map(|(k, v)| (col + k, *v)));
                rhs.push(if d == 0 { waypoint[dim] } else { 0.0 });
            }
        }
    }
}

/// End of piece `k` minus start of piece `k + 1` vanishes for orders `0..=continuity`
pub fn continuity_equalities(
    layout: &Layout,
    basis: &Basis,
    eq: &mut SparseMatrix,
    rhs: &mut Vec<f64>,
) {
    let orders = basis.continuity().min(basis.degree());
    for step in 1..layout.steps() {
        for dim in 0..layout.dims() {
            let prev = layout.index(step - 1, dim, 0);
            let next = layout.index(step, dim, 0);
            for d in 0..=orders {
                let end = basis.projection(PieceEnd::End, d);
                let start = basis.projection(PieceEnd::Start, d);
                let entries = end
                    .iter()
                    .enumerate()
                    .map(|(k, v)| (prev + k, *v))
                    .chain(start.iter().enumerate().map(|(k, v)| (next + k, -*v)));
                eq.push_row(entries);
                rhs.push(0.0);
            }
        }
    }
}

/// Expands per-dimension bounds to every variable of the decision vector
pub fn box_bounds(
    layout: &Layout,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> (DVector<f64>, DVector<f64>) {
    let mut lb = DVector::zeros(layout.len());
    let mut ub = DVector::zeros(layout.len());
    for step in 0..layout.steps() {
        for dim in 0..layout.dims() {
            for ctrl in 0..layout.order() {
                let i = layout.index(step, dim, ctrl);
                lb[i] = lower[dim];
                ub[i] = upper[dim];
            }
        }
    }
    (lb, ub)
}
