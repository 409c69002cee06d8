/*!
# corridor-trajgen

**corridor-trajgen** computes smooth, collision-free trajectories for a robot following a
discrete plan - given the plan's waypoints and, per step, the half-spaces separating the robot
from other robots and from obstacles, the library finds the piecewise polynomial of minimum
acceleration/snap that stays inside those corridors.

## Features
* one Bernstein polynomial piece per plan step, any degree and continuity order
* corridor erosion by ellipsoidal collision shapes and exact redundant-facet removal
* rest conditions at the start and goal, continuity between pieces
* a single convex QP, solved with [Clarabel](https://crates.io/crates/clarabel)
* sampling of position, velocity, acceleration and further derivatives at any time

## Using **corridor-trajgen**
Simply add the following to your `Cargo.toml` file:

```ignore
[dependencies]
corridor-trajgen = "*"
```

and now you can optimize and sample trajectories:

```
use corridor_trajgen::{Halfspace, PlanningProblem, Polytope, TrajectoryOptimizer};
use nalgebra::DVector;

fn main() {
    let optimizer = TrajectoryOptimizer::default();

    // a two step plan along the x-axis inside a 20 x 20 environment
    let path = vec![
        DVector::from_vec(vec![0., 0.]),
        DVector::from_vec(vec![1., 0.]),
        DVector::from_vec(vec![2., 0.]),
    ];
    let lower = DVector::from_vec(vec![-10., -10.]);
    let upper = DVector::from_vec(vec![10., 10.]);

    // keep the robot within |y| <= 0.5 during both steps
    let corridor: Vec<Halfspace> = Polytope::from_box(
        &DVector::from_vec(vec![-1., -0.5]),
        &DVector::from_vec(vec![3., 0.5]),
    )
    .facets()
    .to_vec();

    let problem = PlanningProblem::new(path, lower, upper, 5, 2, 1.0)
        .with_robot_corridors(vec![corridor.clone(), corridor]);
    let result = optimizer.optimize(&problem).unwrap();
    println!("Optimal cost {}", result.cost);

    // use the individual values in real-time, perhaps to control a robot
    let t = 0.24;
    let pos = result.trajectory.position(t).unwrap();
    println!("Current desired position for time {} is {}", t, pos);

    // or get values for a range of times, perhaps to plot
    let path = result.trajectory.positions(0., 2., 0.1);
    assert_eq!(21, path.len());
}
```

Per-step processing of the corridors runs on the rayon thread pool when the `parallel`
feature is enabled.
 */

pub mod basis;
pub mod config;
pub mod constraints;
pub mod corridor;
pub mod cost;
pub mod error;
pub mod layout;
pub mod optimizer;
pub mod polynomial;
pub mod solver;
pub mod sparse;
pub mod trajectory;

pub use basis::{Basis, PieceEnd};
pub use config::{CorridorConfig, CostWeights, OptimizerConfig, SolverConfig, SolverKind};
pub use corridor::{CorridorProcessor, Ellipsoid, Halfspace, Polytope, StepInput};
pub use error::{ConfigError, CorridorError, OptimizeError, ShapeError, SolverError};
pub use layout::Layout;
pub use optimizer::{OptimizedTrajectory, PlanningProblem, TrajectoryOptimizer};
pub use polynomial::Polynomial;
pub use solver::{ClarabelSolver, QpProblem, QpSolution, QpSolver};
pub use trajectory::{Sample, Trajectory};
