use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_acceleration_weight() -> f64 {
    1.0
}
const fn default_jerk_weight() -> f64 {
    0.0
}
const fn default_snap_weight() -> f64 {
    5e-3
}
const fn default_max_rest_derivative() -> usize {
    3
}
const fn default_interior_tolerance() -> f64 {
    1e-9
}
const fn default_redundancy_tolerance() -> f64 {
    1e-7
}
const fn default_true() -> bool {
    true
}
const fn default_max_iter() -> u32 {
    200
}
const fn default_solver_tolerance() -> f64 {
    1e-8
}

/// Weights of the squared-derivative integrals making up the objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    #[serde(default = "default_acceleration_weight")]
    pub acceleration: f64,
    #[serde(default = "default_jerk_weight")]
    pub jerk: f64,
    #[serde(default = "default_snap_weight")]
    pub snap: f64,
}

impl CostWeights {
    /// `(derivative order, weight)` pairs, lowest order first
    pub fn terms(&self) -> [(usize, f64); 3] {
        [(2, self.acceleration), (3, self.jerk), (4, self.snap)]
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            acceleration: default_acceleration_weight(),
            jerk: default_jerk_weight(),
            snap: default_snap_weight(),
        }
    }
}

/// Corridor preprocessing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorridorConfig {
    /// Slack below `-interior_tolerance` at the interior point is an infeasible corridor.
    #[serde(default = "default_interior_tolerance")]
    pub interior_tolerance: f64,

    /// Allowed overshoot of a facet's LP optimum over its offset, scaled by `1 + |b|`.
    #[serde(default = "default_redundancy_tolerance")]
    pub redundancy_tolerance: f64,

    #[serde(default = "default_true")]
    pub remove_redundant: bool,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            interior_tolerance: default_interior_tolerance(),
            redundancy_tolerance: default_redundancy_tolerance(),
            remove_redundant: true,
        }
    }
}

/// Available QP solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Clarabel,
}

/// QP solver selection and its numeric settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub kind: SolverKind,

    #[serde(default = "default_max_iter")]
    pub max_iter: u32,

    /// Wall-clock limit in seconds, unlimited when absent.
    #[serde(default)]
    pub time_limit: Option<f64>,

    #[serde(default = "default_solver_tolerance")]
    pub tol_gap_abs: f64,

    #[serde(default = "default_solver_tolerance")]
    pub tol_gap_rel: f64,

    #[serde(default = "default_solver_tolerance")]
    pub tol_feas: f64,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kind: SolverKind::default(),
            max_iter: default_max_iter(),
            time_limit: None,
            tol_gap_abs: default_solver_tolerance(),
            tol_gap_rel: default_solver_tolerance(),
            tol_feas: default_solver_tolerance(),
            verbose: false,
        }
    }
}

/// Optimizer configuration.
///
/// Every field has a default, so a TOML document only needs to name what it overrides:
///
/// ```
/// use corridor_trajgen::OptimizerConfig;
/// let config = OptimizerConfig::from_toml_str("[cost]\nsnap = 0.01\n").unwrap();
/// assert_eq!(0.01, config.cost.snap);
/// assert_eq!(1.0, config.cost.acceleration);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub cost: CostWeights,

    /// Cap on how many derivatives are pinned to zero at the start and goal.
    /// The effective count is `min(max_rest_derivative, continuity)`.
    #[serde(default = "default_max_rest_derivative")]
    pub max_rest_derivative: usize,

    #[serde(default)]
    pub corridor: CorridorConfig,

    #[serde(default)]
    pub solver: SolverConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cost: CostWeights::default(),
            max_rest_derivative: default_max_rest_derivative(),
            corridor: CorridorConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Number of derivatives held at zero at both ends for the given continuity order.
    pub fn rest_derivatives(&self, continuity: usize) -> usize {
        self.max_rest_derivative.min(continuity)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (order, weight) in self.cost.terms() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(
                    match order {
                        2 => "cost.acceleration",
                        3 => "cost.jerk",
                        _ => "cost.snap",
                    },
                    "must be finite and >= 0",
                ));
            }
        }

        let corridor = &self.corridor;
        if !corridor.interior_tolerance.is_finite() || corridor.interior_tolerance < 0.0 {
            return Err(invalid("corridor.interior_tolerance", "must be finite and >= 0"));
        }
        if !corridor.redundancy_tolerance.is_finite() || corridor.redundancy_tolerance < 0.0 {
            return Err(invalid("corridor.redundancy_tolerance", "must be finite and >= 0"));
        }

        let solver = &self.solver;
        if solver.max_iter == 0 {
            return Err(invalid("solver.max_iter", "must be > 0"));
        }
        if let Some(limit) = solver.time_limit {
            if limit.is_nan() || limit <= 0.0 {
                return Err(invalid("solver.time_limit", "must be > 0"));
            }
        }
        for (field, tol) in [
            ("solver.tol_gap_abs", solver.tol_gap_abs),
            ("solver.tol_gap_rel", solver.tol_gap_rel),
            ("solver.tol_feas", solver.tol_feas),
        ] {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(invalid(field, "must be finite and > 0"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}
