//! QP solver strategy.
//!
//! Problems are posed as
//!
//! ```text
//! minimize    xᵀ Q x + cᵀ x
//! subject to  A_ineq x <= b_ineq
//!             A_eq x    = b_eq
//!             lower <= x <= upper
//! ```
//!
//! and handed to a [`QpSolver`]. The only backend is Clarabel, a pure Rust interior-point
//! solver; which backend is used is decided by [`SolverConfig::kind`].

use std::time::{Duration, Instant};

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use log::{debug, warn};
use nalgebra::DVector;

use crate::config::{SolverConfig, SolverKind};
use crate::error::SolverError;
use crate::sparse::SparseMatrix;

/// A convex quadratic program over `n` variables.
#[derive(Debug, Clone)]
pub struct QpProblem {
    /// Symmetric positive semidefinite `n × n` cost matrix, both triangles stored
    pub cost: SparseMatrix,
    pub linear: DVector<f64>,
    pub ineq: SparseMatrix,
    pub ineq_rhs: DVector<f64>,
    pub eq: SparseMatrix,
    pub eq_rhs: DVector<f64>,
    /// Box bounds, infinite entries are unbounded
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl QpProblem {
    /// Unconstrained problem with zero cost over `n` variables
    pub fn new(n: usize) -> QpProblem {
        QpProblem {
            cost: SparseMatrix::new(n, n),
            linear: DVector::zeros(n),
            ineq: SparseMatrix::new(0, n),
            ineq_rhs: DVector::zeros(0),
            eq: SparseMatrix::new(0, n),
            eq_rhs: DVector::zeros(0),
            lower: DVector::from_element(n, f64::NEG_INFINITY),
            upper: DVector::from_element(n, f64::INFINITY),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.linear.len()
    }

    /// `xᵀ Q x + cᵀ x`
    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        x.dot(&self.cost.mul_vec(x)) + self.linear.dot(x)
    }
}

/// A solved problem.
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub x: DVector<f64>,
    pub objective: f64,
    pub iterations: u32,
    pub solve_time: Duration,
}

/// Pluggable QP backend.
pub trait QpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, SolverError>;
}

/// Instantiates the backend named in the configuration.
pub fn solver_from_config(config: &SolverConfig) -> Box<dyn QpSolver> {
    match config.kind {
        SolverKind::Clarabel => Box::new(ClarabelSolver::new(config.clone())),
    }
}

/// Interior-point backend built on Clarabel.
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {
    config: SolverConfig,
}

impl ClarabelSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl QpSolver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, SolverError> {
        let start = Instant::now();
        let n = problem.num_vars();

        // Clarabel minimizes 1/2 xᵀ P x + qᵀ x with P upper triangular
        let p_csc = to_csc(&problem.cost, 2.0, true);
        let q: Vec<f64> = problem.linear.iter().copied().collect();

        // Stack equalities first (zero cone), then inequalities and finite bounds
        // (nonnegative cone: A x + s = b, s >= 0)
        let mut a_all = problem.eq.clone();
        let mut b_all: Vec<f64> = problem.eq_rhs.iter().copied().collect();
        let n_eq = a_all.nrows();

        a_all.append_rows(&problem.ineq);
        b_all.extend(problem.ineq_rhs.iter().copied());
        for i in 0..n {
            if problem.upper[i].is_finite() {
                a_all.push_row([(i, 1.0)]);
                b_all.push(problem.upper[i]);
            }
            if problem.lower[i].is_finite() {
                a_all.push_row([(i, -1.0)]);
                b_all.push(-problem.lower[i]);
            }
        }
        let n_ineq = a_all.nrows() - n_eq;
        let a_csc = to_csc(&a_all, 1.0, false);

        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
        if n_eq > 0 {
            cones.push(ZeroConeT(n_eq));
        }
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.config.max_iter)
            .time_limit(self.config.time_limit.unwrap_or(f64::INFINITY))
            .verbose(self.config.verbose)
            .tol_gap_abs(self.config.tol_gap_abs)
            .tol_gap_rel(self.config.tol_gap_rel)
            .tol_feas(self.config.tol_feas)
            .build()
            .map_err(|e| SolverError::Setup(e.to_string()))?;

        debug!(
            "Solving QP with {} variables, {} equalities and {} inequalities",
            n, n_eq, n_ineq
        );

        let mut solver = DefaultSolver::new(&p_csc, &q, &a_csc, &b_all, &cones, settings)
            .map_err(|e| SolverError::Setup(format!("{:?}", e)))?;
        solver.solve();

        let solution = &solver.solution;
        match solution.status {
            SolverStatus::Solved => {}
            SolverStatus::AlmostSolved => {
                warn!("QP solved to reduced accuracy");
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolverError::Infeasible);
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(SolverError::Unbounded);
            }
            _ => {
                return Err(SolverError::Failed {
                    status: format!("{:?}", solution.status),
                });
            }
        }

        let x = DVector::from_column_slice(&solution.x);
        Ok(QpSolution {
            objective: problem.objective(&x),
            x,
            iterations: solver.info.iterations,
            solve_time: start.elapsed(),
        })
    }
}

/// Converts a triplet matrix to Clarabel's CSC format, scaling every entry by `scale` and
/// optionally keeping only the upper triangle.
fn to_csc(m: &SparseMatrix, scale: f64, upper_only: bool) -> CscMatrix<f64> {
    let ncols = m.ncols();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    let entries = m
        .compressed()
        .into_iter()
        .filter(|&(r, c, _)| !upper_only || r <= c);
    for (r, c, v) in entries {
        rowval.push(r);
        nzval.push(v * scale);
        colptr[c + 1] += 1;
    }
    for j in 0..ncols {
        colptr[j + 1] += colptr[j];
    }

    CscMatrix::new(m.nrows(), ncols, colptr, rowval, nzval)
}
