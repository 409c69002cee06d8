//! Per-step corridor preprocessing.
//!
//! Each step's corridor is the intersection of the robot-robot and robot-obstacle separating
//! half-spaces. Before it is used to constrain control points the corridor is
//!
//! 1. eroded by the matching collision ellipsoid, so that a control point inside the eroded
//!    corridor keeps the whole ellipsoid inside the original one,
//! 2. stripped of invalid (NaN padded) facets,
//! 3. checked against the step's interior point, and
//! 4. stripped of redundant facets, one small LP per facet.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::config::CorridorConfig;
use crate::error::{CorridorError, ShapeError, SolverError};
use crate::solver::{QpProblem, QpSolver};

/// The closed half-space `normal · x <= offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Halfspace {
    pub normal: DVector<f64>,
    pub offset: f64,
}

impl Halfspace {
    pub fn new(normal: DVector<f64>, offset: f64) -> Halfspace {
        Halfspace { normal, offset }
    }

    /// Builds a half-space from a normal slice
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::Halfspace;
    /// // x <= 1
    /// let h = Halfspace::from_slice(&[1.0, 0.0], 1.0);
    /// assert_eq!(2, h.dim());
    /// ```
    pub fn from_slice(normal: &[f64], offset: f64) -> Halfspace {
        Halfspace::new(DVector::from_column_slice(normal), offset)
    }

    pub fn dim(&self) -> usize {
        self.normal.len()
    }

    /// `offset - normal · point`, non-negative inside
    pub fn slack(&self, point: &DVector<f64>) -> f64 {
        self.offset - self.normal.dot(point)
    }

    pub fn contains(&self, point: &DVector<f64>, tolerance: f64) -> bool {
        self.slack(point) >= -tolerance
    }

    /// A facet is usable when its offset and normal are all numbers
    pub fn is_valid(&self) -> bool {
        !self.offset.is_nan() && self.normal.iter().all(|v| v.is_finite())
    }

    /// Shifts the facet inwards by the ellipsoid's support value along the normal
    pub fn eroded(&self, shape: &Ellipsoid) -> Halfspace {
        Halfspace {
            normal: self.normal.clone(),
            offset: self.offset - shape.support(&self.normal),
        }
    }
}

/// Axis-aligned ellipsoid centered at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    radii: DVector<f64>,
}

impl Ellipsoid {
    pub fn new(radii: DVector<f64>) -> Ellipsoid {
        Ellipsoid { radii }
    }

    pub fn from_slice(radii: &[f64]) -> Ellipsoid {
        Ellipsoid::new(DVector::from_column_slice(radii))
    }

    /// A degenerate ellipsoid, erosion by it is a no-op
    pub fn point(dim: usize) -> Ellipsoid {
        Ellipsoid::new(DVector::zeros(dim))
    }

    pub fn radii(&self) -> &DVector<f64> {
        &self.radii
    }

    pub fn dim(&self) -> usize {
        self.radii.len()
    }

    /// `max { direction · x : x in ellipsoid } = ‖diag(r) direction‖₂`
    pub fn support(&self, direction: &DVector<f64>) -> f64 {
        self.radii.component_mul(direction).norm()
    }
}

/// Convex polytope as a list of half-spaces, possibly unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polytope {
    facets: Vec<Halfspace>,
}

impl Polytope {
    pub fn new(facets: Vec<Halfspace>) -> Polytope {
        Polytope { facets }
    }

    /// Builds a polytope from a fixed-width facet array, `normals` holding one facet per row.
    /// Rows with a NaN offset are padding and are skipped.
    pub fn from_padded(normals: &DMatrix<f64>, offsets: &[f64]) -> Result<Polytope, ShapeError> {
        if normals.nrows() != offsets.len() {
            return Err(ShapeError::PaddedRows {
                normals: normals.nrows(),
                offsets: offsets.len(),
            });
        }
        let facets = normals
            .row_iter()
            .zip(offsets)
            .filter(|(_, b)| !b.is_nan())
            .map(|(a, b)| Halfspace::new(a.transpose(), *b))
            .collect();
        Ok(Polytope { facets })
    }

    /// Axis-aligned box `lower <= x <= upper` as 2·dim facets
    pub fn from_box(lower: &DVector<f64>, upper: &DVector<f64>) -> Polytope {
        let dim = lower.len();
        let mut facets = Vec::with_capacity(2 * dim);
        for i in 0..dim {
            let mut normal = DVector::zeros(dim);
            normal[i] = 1.0;
            facets.push(Halfspace::new(normal.clone(), upper[i]));
            facets.push(Halfspace::new(-normal, -lower[i]));
        }
        Polytope { facets }
    }

    pub fn facets(&self) -> &[Halfspace] {
        &self.facets
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn contains(&self, point: &DVector<f64>, tolerance: f64) -> bool {
        self.facets.iter().all(|h| h.contains(point, tolerance))
    }

    /// Every facet eroded by the same shape
    pub fn eroded(&self, shape: &Ellipsoid) -> Polytope {
        Polytope::new(self.facets.iter().map(|h| h.eroded(shape)).collect())
    }

    /// Drops facets that are not numbers
    pub fn without_invalid(self) -> Polytope {
        Polytope::new(self.facets.into_iter().filter(Halfspace::is_valid).collect())
    }

    pub fn extend(&mut self, other: Polytope) {
        self.facets.extend(other.facets);
    }

    /// Index and slack of the most violated facet at `point`, if any falls below `-tolerance`
    pub fn worst_violation(&self, point: &DVector<f64>, tolerance: f64) -> Option<(usize, f64)> {
        self.facets
            .iter()
            .map(|h| h.slack(point))
            .enumerate()
            .filter(|(_, slack)| *slack < -tolerance || slack.is_nan())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Erodes, cleans and reduces the corridors of every step.
pub struct CorridorProcessor<'a> {
    solver: &'a dyn QpSolver,
    config: CorridorConfig,
}

/// Raw separating half-spaces of one step, before any processing.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub robots: &'a [Halfspace],
    pub obstacles: &'a [Halfspace],
    pub interior: &'a DVector<f64>,
}

impl<'a> CorridorProcessor<'a> {
    /// Redundancy LPs are posed to `solver`
    pub fn new(solver: &'a dyn QpSolver, config: CorridorConfig) -> CorridorProcessor<'a> {
        CorridorProcessor { solver, config }
    }

    /// Processes one step's corridor
    pub fn process_step(
        &self,
        step: usize,
        input: &StepInput<'_>,
        robot_shape: &Ellipsoid,
        obstacle_shape: &Ellipsoid,
    ) -> Result<Polytope, CorridorError> {
        if input.interior.iter().any(|v| !v.is_finite()) {
            return Err(CorridorError::NonFiniteInteriorPoint { step });
        }

        let mut corridor = Polytope::new(input.robots.to_vec()).eroded(robot_shape);
        corridor.extend(Polytope::new(input.obstacles.to_vec()).eroded(obstacle_shape));
        let corridor = corridor.without_invalid();

        if let Some((facet, slack)) =
            corridor.worst_violation(input.interior, self.config.interior_tolerance)
        {
            return Err(CorridorError::InteriorPointOutside { step, facet, slack });
        }

        if !self.config.remove_redundant {
            return Ok(corridor);
        }

        let total = corridor.len();
        let reduced = self.remove_redundant(corridor);
        debug!("Step {}: kept {} of {} corridor facets", step, reduced.len(), total);
        Ok(reduced)
    }

    /// Processes every step, in parallel when the `parallel` feature is enabled
    pub fn process_all(
        &self,
        inputs: &[StepInput<'_>],
        robot_shape: &Ellipsoid,
        obstacle_shape: &Ellipsoid,
    ) -> Result<Vec<Polytope>, CorridorError> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            inputs
                .par_iter()
                .enumerate()
                .map(|(step, input)| self.process_step(step, input, robot_shape, obstacle_shape))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            inputs
                .iter()
                .enumerate()
                .map(|(step, input)| self.process_step(step, input, robot_shape, obstacle_shape))
                .collect()
        }
    }

    /// Removes facets implied by the others
    ///
    /// Facet j is redundant when `max { a_j · x : a_i · x <= b_i (i kept, i != j) }` does not
    /// exceed `b_j`; an unbounded maximum keeps it. Redundant facets are dropped one at a time,
    /// so of two identical facets one survives. The feasible set never changes.
    pub fn remove_redundant(&self, corridor: Polytope) -> Polytope {
        let facets = corridor.facets;

        // a zero normal is either always satisfied or already caught by the interior check
        let mut kept: Vec<bool> = facets
            .iter()
            .map(|h| h.normal.iter().any(|v| *v != 0.0))
            .collect();

        for j in 0..facets.len() {
            if !kept[j] {
                continue;
            }
            let candidate = &facets[j];

            let others: Vec<&Halfspace> = facets
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != j && kept[*i])
                .map(|(_, h)| h)
                .collect();
            if others.is_empty() {
                continue;
            }

            let mut lp = QpProblem::new(candidate.dim());
            lp.linear = -candidate.normal.clone();
            let mut rhs = Vec::with_capacity(others.len());
            for h in others {
                lp.ineq.push_row(h.normal.iter().copied().enumerate());
                rhs.push(h.offset);
            }
            lp.ineq_rhs = DVector::from_vec(rhs);

            match self.solver.solve(&lp) {
                Ok(solution) => {
                    let max = -solution.objective;
                    let slack = self.config.redundancy_tolerance * (1.0 + candidate.offset.abs());
                    if max <= candidate.offset + slack {
                        kept[j] = false;
                    }
                }
                Err(SolverError::Unbounded) => {
                    debug!("Facet {} is unbounded by the others, keeping it", j);
                }
                Err(e) => {
                    warn!("Redundancy check for facet {} failed ({}), keeping it", j, e);
                }
            }
        }

        Polytope::new(
            facets
                .into_iter()
                .zip(kept)
                .filter(|(_, keep)| *keep)
                .map(|(h, _)| h)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::solver::ClarabelSolver;
    use assert::close;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_column_slice(values)
    }

    fn unit_square() -> Vec<Halfspace> {
        vec![
            Halfspace::from_slice(&[1.0, 0.0], 1.0),
            Halfspace::from_slice(&[-1.0, 0.0], 1.0),
            Halfspace::from_slice(&[0.0, 1.0], 1.0),
            Halfspace::from_slice(&[0.0, -1.0], 1.0),
        ]
    }

    #[test]
    fn ellipsoid_support() {
        let shape = Ellipsoid::from_slice(&[0.3, 0.1]);
        close(0.3, shape.support(&v(&[1.0, 0.0])), 1e-12);
        close(0.2, shape.support(&v(&[0.0, -2.0])), 1e-12);
        close((0.09f64 + 0.01).sqrt(), shape.support(&v(&[1.0, 1.0])), 1e-12);
        assert_eq!(0.0, Ellipsoid::point(2).support(&v(&[3.0, 4.0])));
    }

    #[test]
    fn erosion_shrinks_offsets() {
        let h = Halfspace::from_slice(&[0.0, 2.0], 3.0);
        let eroded = h.eroded(&Ellipsoid::from_slice(&[0.5, 0.25]));
        close(2.5, eroded.offset, 1e-12);
        assert_eq!(h.normal, eroded.normal);
    }

    #[test]
    fn eroded_polytope_is_subset() {
        let square = Polytope::new(unit_square());
        let diamond = Polytope::new(vec![
            Halfspace::from_slice(&[1.0, 1.0], 1.5),
            Halfspace::from_slice(&[-1.0, 1.0], 1.5),
            Halfspace::from_slice(&[1.0, -1.0], 1.5),
            Halfspace::from_slice(&[-1.0, -1.0], 1.5),
        ]);
        let shape = Ellipsoid::from_slice(&[0.2, 0.05]);

        for polytope in [square, diamond] {
            let eroded = polytope.eroded(&shape);
            for i in -30..=30 {
                for j in -30..=30 {
                    let p = v(&[i as f64 * 0.05, j as f64 * 0.05]);
                    if eroded.contains(&p, 0.0) {
                        assert!(polytope.contains(&p, 0.0));
                        // the ellipsoid around an eroded point stays inside the original
                        for h in polytope.facets() {
                            assert!(h.slack(&p) >= shape.support(&h.normal) - 1e-12);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn padded_rows_are_dropped() {
        let normals = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, f64::NAN, f64::NAN, 0.0, 1.0]);
        let polytope = Polytope::from_padded(&normals, &[1.0, f64::NAN, 2.0]).unwrap();
        assert_eq!(2, polytope.len());
        assert_eq!(2.0, polytope.facets()[1].offset);

        let with_nan = Polytope::new(vec![
            Halfspace::from_slice(&[1.0, 0.0], f64::NAN),
            Halfspace::from_slice(&[1.0, 0.0], 1.0),
        ]);
        assert_eq!(1, with_nan.without_invalid().len());
    }

    #[test]
    fn padded_offsets_must_match_rows() {
        let normals = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, f64::NAN, f64::NAN]);
        assert_eq!(
            ShapeError::PaddedRows {
                normals: 2,
                offsets: 3
            },
            Polytope::from_padded(&normals, &[1.0, f64::NAN, 2.0]).unwrap_err()
        );
    }

    #[test]
    fn box_facets() {
        let b = Polytope::from_box(&v(&[-1.0, 0.0]), &v(&[1.0, 2.0]));
        assert_eq!(4, b.len());
        assert!(b.contains(&v(&[0.5, 1.5]), 0.0));
        assert!(!b.contains(&v(&[0.5, -0.1]), 0.0));
    }

    #[test]
    fn worst_violation_reports_most_negative_slack() {
        let square = Polytope::new(unit_square());
        assert_eq!(None, square.worst_violation(&v(&[0.0, 0.0]), 0.0));
        let (facet, slack) = square.worst_violation(&v(&[1.5, -3.0]), 0.0).unwrap();
        assert_eq!(3, facet);
        close(-2.0, slack, 1e-12);
    }

    fn with_processor<F: FnOnce(&CorridorProcessor<'_>)>(f: F) {
        let solver = ClarabelSolver::new(SolverConfig::default());
        let processor = CorridorProcessor::new(&solver, CorridorConfig::default());
        f(&processor);
    }

    #[test]
    fn redundant_facets_removed() {
        let mut facets = unit_square();
        facets.push(Halfspace::from_slice(&[1.0, 1.0], 5.0));
        facets.push(Halfspace::from_slice(&[1.0, 0.0], 2.0));
        facets.push(Halfspace::from_slice(&[1.0, 0.0], 1.0));
        facets.push(Halfspace::from_slice(&[0.0, 0.0], 1.0));

        with_processor(|processor| {
            let reduced = processor.remove_redundant(Polytope::new(facets.clone()));
            assert_eq!(4, reduced.len());

            // one copy of the duplicated x <= 1 facet survives
            let right = reduced
                .facets()
                .iter()
                .filter(|h| h.normal == v(&[1.0, 0.0]))
                .count();
            assert_eq!(1, right);
        });
    }

    #[test]
    fn reduction_preserves_feasible_set() {
        let mut facets = unit_square();
        facets.push(Halfspace::from_slice(&[1.0, 1.0], 1.5));
        facets.push(Halfspace::from_slice(&[1.0, 1.0], 1.8));
        facets.push(Halfspace::from_slice(&[-1.0, 2.0], 10.0));
        facets.push(Halfspace::from_slice(&[3.0, 1.0], 4.0));
        let original = Polytope::new(facets);

        with_processor(|processor| {
            let reduced = processor.remove_redundant(original.clone());
            assert!(reduced.len() < original.len());

            // a fine grid around the square and a coarse one far outside it
            let fine = (-40..=40).map(|i| i as f64 * 0.0625);
            let coarse = (-30..=30).map(|i| i as f64 * 1.5);
            let samples: Vec<f64> = fine.chain(coarse).collect();
            for x in &samples {
                for y in &samples {
                    let p = v(&[*x, *y]);
                    assert_eq!(
                        original.contains(&p, 1e-9),
                        reduced.contains(&p, 1e-9),
                        "membership differs at {:?}",
                        p
                    );
                }
            }
        });
    }

    #[test]
    fn unbounded_corridor_keeps_its_facets() {
        // a slab open along y, every facet bounds it on its own
        let slab = Polytope::new(vec![
            Halfspace::from_slice(&[1.0, 0.0], 20.0),
            Halfspace::from_slice(&[-1.0, 0.0], 1.0),
            Halfspace::from_slice(&[1.0, 0.0], 25.0),
        ]);

        with_processor(|processor| {
            let reduced = processor.remove_redundant(slab.clone());
            assert_eq!(2, reduced.len());
            for p in [v(&[25.0, 0.0]), v(&[21.0, -100.0]), v(&[-2.0, 0.0])] {
                assert!(!slab.contains(&p, 1e-9));
                assert!(!reduced.contains(&p, 1e-9), "{:?} accepted after reduction", p);
            }
            assert!(reduced.contains(&v(&[19.0, 1e3]), 1e-9));
        });
    }

    #[test]
    fn lone_facet_is_kept() {
        let half = Polytope::new(vec![Halfspace::from_slice(&[0.0, 1.0], 2.0)]);
        with_processor(|processor| {
            assert_eq!(half, processor.remove_redundant(half.clone()));
        });
    }

    #[test]
    fn process_step_erodes_and_reduces() {
        let robots = unit_square();
        let obstacles = vec![
            Halfspace::from_slice(&[1.0, 0.0], 3.0),
            Halfspace::from_slice(&[f64::NAN, f64::NAN], f64::NAN),
        ];
        let interior = v(&[0.0, 0.0]);
        let input = StepInput {
            robots: &robots,
            obstacles: &obstacles,
            interior: &interior,
        };

        with_processor(|processor| {
            let corridor = processor
                .process_step(0, &input, &Ellipsoid::from_slice(&[0.1, 0.2]), &Ellipsoid::point(2))
                .unwrap();
            assert_eq!(4, corridor.len());
            assert!(corridor.contains(&v(&[0.9, 0.8]), 1e-12));
            assert!(!corridor.contains(&v(&[0.95, 0.0]), 1e-12));
            assert!(!corridor.contains(&v(&[0.0, -0.85]), 1e-12));
        });
    }

    #[test]
    fn collapsed_corridor_is_infeasible() {
        // the corridor is the single point (0.5, 0)
        let robots = vec![
            Halfspace::from_slice(&[1.0, 0.0], 0.5),
            Halfspace::from_slice(&[-1.0, 0.0], -0.5),
            Halfspace::from_slice(&[0.0, 1.0], 0.0),
            Halfspace::from_slice(&[0.0, -1.0], 0.0),
        ];
        let interior = v(&[0.5, 0.0]);
        let input = StepInput {
            robots: &robots,
            obstacles: &[],
            interior: &interior,
        };

        with_processor(|processor| {
            let err = processor
                .process_step(4, &input, &Ellipsoid::from_slice(&[0.1, 0.1]), &Ellipsoid::point(2))
                .unwrap_err();
            match err {
                CorridorError::InteriorPointOutside { step, slack, .. } => {
                    assert_eq!(4, step);
                    close(-0.1, slack, 1e-12);
                }
                other => panic!("unexpected error {:?}", other),
            }
        });
    }

    #[test]
    fn non_finite_interior_point() {
        let robots = unit_square();
        let interior = v(&[f64::NAN, 0.0]);
        let input = StepInput {
            robots: &robots,
            obstacles: &[],
            interior: &interior,
        };
        with_processor(|processor| {
            let err = processor
                .process_step(1, &input, &Ellipsoid::point(2), &Ellipsoid::point(2))
                .unwrap_err();
            assert_eq!(CorridorError::NonFiniteInteriorPoint { step: 1 }, err);
        });
    }

    #[test]
    fn process_all_keeps_step_order() {
        let robots = unit_square();
        let wide: Vec<Halfspace> = unit_square()
            .into_iter()
            .map(|h| Halfspace::new(h.normal, 4.0))
            .collect();
        let interior = v(&[0.0, 0.0]);
        let inputs = [
            StepInput { robots: &robots, obstacles: &[], interior: &interior },
            StepInput { robots: &wide, obstacles: &[], interior: &interior },
        ];

        with_processor(|processor| {
            let corridors = processor
                .process_all(&inputs, &Ellipsoid::point(2), &Ellipsoid::point(2))
                .unwrap();
            assert_eq!(2, corridors.len());
            assert!(!corridors[0].contains(&v(&[2.0, 0.0]), 0.0));
            assert!(corridors[1].contains(&v(&[2.0, 0.0]), 0.0));
        });
    }
}
