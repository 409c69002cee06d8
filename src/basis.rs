//! Bernstein basis of a single polynomial piece, in monomial form over `[0, timescale]`.
//!
//! Rows of every matrix here index the basis polynomial (equivalently the control point it
//! weights) and columns index the monomial power, lowest first. A piece with control points
//! `p` therefore has monomial coefficients `Bᵀ p`.

use nalgebra::{DMatrix, DVector, RowDVector};

/// Which end of the local interval a projection row is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceEnd {
    Start,
    End,
}

/// Binomial coefficient as a float, exact for the small degrees used here.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// `power! / (power - d)!`, the factor `t^power` picks up after `d` differentiations.
pub fn falling_factorial(power: usize, d: usize) -> f64 {
    if d > power {
        return 0.0;
    }
    ((power - d + 1)..=power).fold(1.0, |acc, k| acc * k as f64)
}

/// Returns the row that evaluates the `d`-th time derivative of a polynomial at time t
/// given its monomial coefficients: `f^(d)(t) = row · c`
///
/// Powers below `d` vanish, so the row keeps a fixed width with zeros in those slots.
pub fn derivative_row(order: usize, d: usize, t: f64) -> RowDVector<f64> {
    let mut row = RowDVector::zeros(order);
    for power in d..order {
        row[power] = falling_factorial(power, d) * t.powi((power - d) as i32);
    }
    row
}

/// Bernstein basis of the given degree in monomial form, rescaled to `[0, timescale]`
///
/// Entry `(i, k)` is the coefficient of `t^k` in `C(n,i) (t/T)^i (1 - t/T)^(n-i)`.
pub fn bernstein_matrix(degree: usize, timescale: f64) -> DMatrix<f64> {
    let order = degree + 1;
    let mut m = DMatrix::zeros(order, order);
    for i in 0..order {
        let scale = binomial(degree, i);
        for k in i..order {
            let sign = if (k - i) % 2 == 0 { 1.0 } else { -1.0 };
            m[(i, k)] = scale * binomial(degree - i, k - i) * sign / timescale.powi(k as i32);
        }
    }
    m
}

/// Basis matrices shared, read-only, by the constraint and cost builders.
#[derive(Debug, Clone)]
pub struct Basis {
    degree: usize,
    continuity: usize,
    timescale: f64,
    matrix: DMatrix<f64>,
    derivatives: Vec<DMatrix<f64>>,
    start: DMatrix<f64>,
    end: DMatrix<f64>,
}

impl Basis {
    /// Builds the basis for pieces of the given degree lasting `timescale`, with derivative
    /// slices and end projections for orders `0..=continuity`
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::Basis;
    /// let basis = Basis::new(3, 2, 1.0);
    /// assert_eq!(4, basis.order());
    /// ```
    pub fn new(degree: usize, continuity: usize, timescale: f64) -> Basis {
        let order = degree + 1;
        let matrix = bernstein_matrix(degree, timescale);

        let derivatives: Vec<DMatrix<f64>> = (0..=continuity)
            .map(|d| {
                // shift each basis polynomial's coefficients down by d powers, the vacated
                // high-power slots stay zero
                let mut slice = DMatrix::zeros(order, order);
                for i in 0..order {
                    for k in 0..order.saturating_sub(d) {
                        slice[(i, k)] = matrix[(i, k + d)] * falling_factorial(k + d, d);
                    }
                }
                slice
            })
            .collect();

        // row d evaluates slice d at t: [1, t, t^2, ...] · D_dᵀ
        let projections = |t: f64| {
            let powers = derivative_row(order, 0, t);
            let mut rows = DMatrix::zeros(continuity + 1, order);
            for (d, slice) in derivatives.iter().enumerate() {
                rows.set_row(d, &(&powers * slice.transpose()));
            }
            rows
        };
        let start = projections(0.0);
        let end = projections(timescale);

        Basis {
            degree,
            continuity,
            timescale,
            matrix,
            derivatives,
            start,
            end,
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of control points per piece and dimension
    pub fn order(&self) -> usize {
        self.degree + 1
    }

    pub fn continuity(&self) -> usize {
        self.continuity
    }

    pub fn timescale(&self) -> f64 {
        self.timescale
    }

    /// The `order × order` Bernstein-to-monomial matrix
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Slice `d` of the derivative basis, `d` in `0..=continuity`
    pub fn derivative(&self, d: usize) -> &DMatrix<f64> {
        &self.derivatives[d]
    }

    /// Row that maps a piece's control points (one dimension) to its `d`-th derivative at the
    /// given end of the piece
    pub fn projection(&self, end: PieceEnd, d: usize) -> RowDVector<f64> {
        match end {
            PieceEnd::Start => self.start.row(d).into_owned(),
            PieceEnd::End => self.end.row(d).into_owned(),
        }
    }

    /// Monomial coefficients of a piece from its control points along one dimension
    pub fn coefficients(&self, control_points: &DVector<f64>) -> DVector<f64> {
        self.matrix.tr_mul(control_points)
    }
}
