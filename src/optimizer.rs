//! Public entry point: validates a planning problem, builds the QP and turns its solution back
//! into a piecewise polynomial.

use std::time::Duration;

use log::{debug, info};
use nalgebra::DVector;

use crate::basis::Basis;
use crate::config::OptimizerConfig;
use crate::constraints::{assemble, BoundaryConditions};
use crate::corridor::{CorridorProcessor, Ellipsoid, Halfspace, Polytope, StepInput};
use crate::cost::build_cost;
use crate::error::{ConfigError, OptimizeError, ShapeError};
use crate::layout::Layout;
use crate::solver::{solver_from_config, QpProblem, QpSolver};
use crate::trajectory::Trajectory;

/// Everything one optimization call needs.
#[derive(Debug, Clone)]
pub struct PlanningProblem {
    /// Discrete plan, one more waypoint than steps
    pub path: Vec<DVector<f64>>,
    /// Robot-robot separating half-spaces, one list per step
    pub robot_corridors: Vec<Vec<Halfspace>>,
    /// Robot-obstacle separating half-spaces, one list per step
    pub obstacle_corridors: Vec<Vec<Halfspace>>,
    /// Environment bounds per dimension
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
    pub degree: usize,
    pub continuity: usize,
    /// Duration of every step
    pub timescale: f64,
    pub robot_shape: Ellipsoid,
    pub obstacle_shape: Ellipsoid,
}

impl PlanningProblem {
    /// A problem with empty corridors and point-sized collision shapes
    pub fn new(
        path: Vec<DVector<f64>>,
        lower: DVector<f64>,
        upper: DVector<f64>,
        degree: usize,
        continuity: usize,
        timescale: f64,
    ) -> PlanningProblem {
        let steps = path.len().saturating_sub(1);
        let dims = lower.len();
        PlanningProblem {
            path,
            robot_corridors: vec![Vec::new(); steps],
            obstacle_corridors: vec![Vec::new(); steps],
            lower,
            upper,
            degree,
            continuity,
            timescale,
            robot_shape: Ellipsoid::point(dims),
            obstacle_shape: Ellipsoid::point(dims),
        }
    }

    pub fn with_robot_corridors(mut self, corridors: Vec<Vec<Halfspace>>) -> Self {
        self.robot_corridors = corridors;
        self
    }

    pub fn with_obstacle_corridors(mut self, corridors: Vec<Vec<Halfspace>>) -> Self {
        self.obstacle_corridors = corridors;
        self
    }

    pub fn with_shapes(mut self, robot: Ellipsoid, obstacle: Ellipsoid) -> Self {
        self.robot_shape = robot;
        self.obstacle_shape = obstacle;
        self
    }

    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn dims(&self) -> usize {
        self.path.first().map_or(0, |p| p.len())
    }

    /// Checks every shape contract, before anything is built
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.path.len() < 2 {
            return Err(ShapeError::TooFewWaypoints(self.path.len()));
        }
        let dims = self.dims();
        let steps = self.steps();

        for (index, waypoint) in self.path.iter().enumerate() {
            if waypoint.len() != dims {
                return Err(ShapeError::WaypointDimension {
                    index,
                    expected: dims,
                    got: waypoint.len(),
                });
            }
        }

        for (kind, corridors) in [
            ("Robot", &self.robot_corridors),
            ("Obstacle", &self.obstacle_corridors),
        ] {
            if corridors.len() != steps {
                return Err(ShapeError::CorridorSteps {
                    kind,
                    expected: steps,
                    got: corridors.len(),
                });
            }
            for (step, facets) in corridors.iter().enumerate() {
                if let Some(facet) = facets.iter().find(|h| h.dim() != dims) {
                    return Err(ShapeError::FacetDimension {
                        kind,
                        step,
                        expected: dims,
                        got: facet.dim(),
                    });
                }
            }
        }

        for bound in [&self.lower, &self.upper] {
            if bound.len() != dims {
                return Err(ShapeError::BoundsDimension {
                    expected: dims,
                    got: bound.len(),
                });
            }
        }
        for dim in 0..dims {
            let (lo, hi) = (self.lower[dim], self.upper[dim]);
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(ShapeError::InvalidBounds(dim));
            }
        }

        for (kind, shape) in [("Robot", &self.robot_shape), ("Obstacle", &self.obstacle_shape)] {
            if shape.dim() != dims {
                return Err(ShapeError::EllipsoidDimension {
                    kind,
                    expected: dims,
                    got: shape.dim(),
                });
            }
            if shape.radii().iter().any(|r| !r.is_finite() || *r < 0.0) {
                return Err(ShapeError::InvalidRadii { kind });
            }
        }

        if !self.timescale.is_finite() || self.timescale <= 0.0 {
            return Err(ShapeError::InvalidTimescale(self.timescale));
        }

        Ok(())
    }
}

/// A solved trajectory together with solve statistics.
#[derive(Debug, Clone)]
pub struct OptimizedTrajectory {
    pub trajectory: Trajectory,
    /// Optimal value of the weighted squared-derivative integral
    pub cost: f64,
    pub solver: &'static str,
    pub iterations: u32,
    pub solve_time: Duration,
    /// Facets kept per step after erosion and redundancy elimination
    pub facet_counts: Vec<usize>,
}

/// Corridor-constrained piecewise polynomial trajectory optimizer.
pub struct TrajectoryOptimizer {
    config: OptimizerConfig,
    solver: Box<dyn QpSolver>,
}

impl Default for TrajectoryOptimizer {
    fn default() -> Self {
        let config = OptimizerConfig::default();
        let solver = solver_from_config(&config.solver);
        TrajectoryOptimizer { config, solver }
    }
}

impl TrajectoryOptimizer {
    /// Returns an optimizer using the solver backend named in `config`
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::{OptimizerConfig, TrajectoryOptimizer};
    /// let optimizer = TrajectoryOptimizer::new(OptimizerConfig::default()).unwrap();
    /// assert_eq!("clarabel", optimizer.solver_name());
    /// ```
    pub fn new(config: OptimizerConfig) -> Result<TrajectoryOptimizer, ConfigError> {
        let solver = solver_from_config(&config.solver);
        Self::with_solver(config, solver)
    }

    /// Returns an optimizer using a caller supplied backend
    pub fn with_solver(
        config: OptimizerConfig,
        solver: Box<dyn QpSolver>,
    ) -> Result<TrajectoryOptimizer, ConfigError> {
        config.validate()?;
        Ok(TrajectoryOptimizer { config, solver })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Computes the minimum cost trajectory through the problem's corridors
    pub fn optimize(&self, problem: &PlanningProblem) -> Result<OptimizedTrajectory, OptimizeError> {
        problem.validate()?;

        let steps = problem.steps();
        let dims = problem.dims();
        info!(
            "Optimizing {}D trajectory over {} steps, degree {} with continuity {}",
            dims, steps, problem.degree, problem.continuity
        );

        let basis = Basis::new(problem.degree, problem.continuity, problem.timescale);
        let layout = Layout::new(dims, basis.order(), steps);

        // the midpoint of each step's waypoints is the corridor's interior point
        let interiors: Vec<DVector<f64>> = problem
            .path
            .windows(2)
            .map(|w| (&w[0] + &w[1]) * 0.5)
            .collect();
        let inputs: Vec<StepInput<'_>> = interiors
            .iter()
            .enumerate()
            .map(|(step, interior)| StepInput {
                robots: &problem.robot_corridors[step],
                obstacles: &problem.obstacle_corridors[step],
                interior,
            })
            .collect();

        let processor = CorridorProcessor::new(self.solver.as_ref(), self.config.corridor);
        let corridors =
            processor.process_all(&inputs, &problem.robot_shape, &problem.obstacle_shape)?;
        let facet_counts: Vec<usize> = corridors.iter().map(Polytope::len).collect();

        let boundary = BoundaryConditions {
            start: &problem.path[0],
            goal: &problem.path[steps],
            rest_derivatives: self.config.rest_derivatives(problem.continuity),
        };
        let constraints = assemble(
            &layout,
            &basis,
            &corridors,
            &boundary,
            &problem.lower,
            &problem.upper,
        );
        debug!(
            "QP has {} variables, {} equalities and {} corridor inequalities",
            layout.len(),
            constraints.num_eq(),
            constraints.num_ineq()
        );

        let qp = QpProblem {
            cost: build_cost(&layout, &basis, &self.config.cost),
            linear: DVector::zeros(layout.len()),
            ineq: constraints.ineq,
            ineq_rhs: constraints.ineq_rhs,
            eq: constraints.eq,
            eq_rhs: constraints.eq_rhs,
            lower: constraints.lower,
            upper: constraints.upper,
        };
        let solution = self.solver.solve(&qp)?;

        let control_points = (0..steps)
            .map(|step| layout.control_points(&solution.x, step))
            .collect();
        let trajectory = Trajectory::from_control_points(&basis, control_points);

        info!(
            "Finished optimizing trajectory with cost {} after {} iterations ({:?})",
            solution.objective, solution.iterations, solution.solve_time
        );

        Ok(OptimizedTrajectory {
            trajectory,
            cost: solution.objective,
            solver: self.solver.name(),
            iterations: solution.iterations,
            solve_time: solution.solve_time,
            facet_counts,
        })
    }
}
