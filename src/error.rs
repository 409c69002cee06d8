use thiserror::Error;

/// Top-level error returned by [`crate::TrajectoryOptimizer::optimize`].
///
/// Every variant aborts the whole optimization; no partial trajectory is returned.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("Invalid problem shape: {0}")]
    Shape(#[from] ShapeError),

    #[error("Corridor infeasible: {0}")]
    Corridor(#[from] CorridorError),

    #[error("QP solve failed: {0}")]
    Solver(#[from] SolverError),
}

/// Contract violations on the problem inputs, detected before any matrix is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("At least 2 waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("Waypoint {index} has dimension {got}, expected {expected}")]
    WaypointDimension {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("{kind} corridors cover {got} steps, expected {expected}")]
    CorridorSteps {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{kind} facet at step {step} has dimension {got}, expected {expected}")]
    FacetDimension {
        kind: &'static str,
        step: usize,
        expected: usize,
        got: usize,
    },

    #[error("Bounds have dimension {got}, expected {expected}")]
    BoundsDimension { expected: usize, got: usize },

    #[error("Bounds along dimension {0} must be finite with lower <= upper")]
    InvalidBounds(usize),

    #[error("{kind} ellipsoid has dimension {got}, expected {expected}")]
    EllipsoidDimension {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{kind} ellipsoid radii must be finite and non-negative")]
    InvalidRadii { kind: &'static str },

    #[error("Invalid timescale: {0} (must be finite and > 0)")]
    InvalidTimescale(f64),

    #[error("Padded facet array has {normals} normal rows but {offsets} offsets")]
    PaddedRows { normals: usize, offsets: usize },
}

/// Geometric infeasibility of a single step's eroded corridor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorridorError {
    #[error("Interior point of step {step} violates eroded facet {facet} (slack {slack})")]
    InteriorPointOutside { step: usize, facet: usize, slack: f64 },

    #[error("Interior point of step {step} is not finite")]
    NonFiniteInteriorPoint { step: usize },
}

/// Outcome of an unsuccessful QP (or redundancy LP) solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Problem is infeasible")]
    Infeasible,

    #[error("Problem is unbounded")]
    Unbounded,

    #[error("Solver stopped with status {status}")]
    Failed { status: String },

    #[error("Solver setup failed: {0}")]
    Setup(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
