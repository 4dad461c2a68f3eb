//! Solver backends for block subproblems, the flattened model and the
//! cutting-plane master.
//!
//! Blocks and the flattened model are handed to a [`SolverBackend`] as a
//! [`QpProblem`]: bounded variables, linear rows and an objective with an
//! optional quadratic part. Backends are matched to the problem by capability
//! (`supports_quadratic`), so the ADMM strategy can refuse an LP-only backend
//! before the first iteration instead of failing halfway through.
//!
//! The master problem of the cutting-plane and bundle strategies is a plain LP
//! that is rebuilt from its cut list on every solve; it goes through good_lp so
//! any of its solvers can be selected with [`LpSolverKind`].

mod clarabel;

pub use self::clarabel::ClarabelBackend;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gdd_core::{Relation, VarKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Linear row `Σ coef·x[var] (relation) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Problem handed to a backend:
///
/// ```text
///   minimize    Σ linear_k x_k + Σ q_ij x_i x_j + constant
///   subject to  rows
///               lower ≤ x ≤ upper
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QpProblem {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub kinds: Vec<VarKind>,
    pub rows: Vec<Row>,
    pub linear: Vec<f64>,
    /// `(i, j, coef)` meaning `coef·x_i·x_j`.
    pub quadratic: Vec<(usize, usize, f64)>,
    pub constant: f64,
}

impl QpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with zero objective coefficient, returning its index.
    pub fn add_variable(&mut self, lower: f64, upper: f64, kind: VarKind) -> usize {
        self.lower.push(lower);
        self.upper.push(upper);
        self.kinds.push(kind);
        self.linear.push(0.0);
        self.lower.len() - 1
    }

    pub fn add_row(&mut self, terms: Vec<(usize, f64)>, relation: Relation, rhs: f64) -> usize {
        self.rows.push(Row {
            terms,
            relation,
            rhs,
        });
        self.rows.len() - 1
    }

    pub fn num_variables(&self) -> usize {
        self.lower.len()
    }

    pub fn is_quadratic(&self) -> bool {
        self.quadratic.iter().any(|&(_, _, c)| c != 0.0)
    }

    /// Fix variable `var` to `value` (equal lower and upper bound).
    pub fn fix(&mut self, var: usize, value: f64) {
        self.lower[var] = value;
        self.upper[var] = value;
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let lin: f64 = self.linear.iter().zip(x).map(|(c, v)| c * v).sum();
        let quad: f64 = self
            .quadratic
            .iter()
            .map(|&(i, j, c)| c * x[i] * x[j])
            .sum();
        self.constant + lin + quad
    }
}

/// Terminal status reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Optimal,
    /// Iteration/progress limit hit with a usable point.
    Suboptimal,
    Infeasible,
    Unbounded,
    NumericalError,
}

impl SolveStatus {
    /// Whether the returned values can be used.
    pub fn has_solution(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Suboptimal)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Suboptimal => write!(f, "suboptimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::NumericalError => write!(f, "numerical error"),
        }
    }
}

/// Backend output. `values`, `objective` and `duals` are only meaningful when
/// [`SolveStatus::has_solution`] holds.
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub objective: f64,
    /// One multiplier per row, signed so that the Lagrangian reads
    /// `f(x) + Σ dual_r (a_r·x − rhs_r)`.
    pub duals: Vec<f64>,
    pub iterations: usize,
    pub solve_time: Duration,
}

impl QpSolution {
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            duals: Vec::new(),
            iterations: 0,
            solve_time: Duration::ZERO,
        }
    }
}

/// Backend failures that are not a solver verdict on the problem itself.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Solver setup failed: {0}")]
    Setup(String),

    #[error("Unsupported problem: {0}")]
    Unsupported(String),
}

/// Block Model Adapter: solves a [`QpProblem`] to optimality.
pub trait SolverBackend: Send + Sync {
    /// Unique identifier (e.g., "clarabel")
    fn id(&self) -> &str;

    /// Whether quadratic objectives (ADMM consensus penalty) are accepted
    fn supports_quadratic(&self) -> bool;

    /// Whether integrality markers are enforced. Continuous backends solve
    /// the relaxation instead.
    fn supports_integer(&self) -> bool {
        false
    }

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, BackendError>;
}

/// good_lp solver used for the cutting-plane master problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpSolverKind {
    /// Needs the `solver-clarabel` feature; without it the master solve fails.
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    #[cfg(feature = "solver-clarabel")]
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_solver_error(label: &str) -> String {
    format!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => {
                #[cfg(feature = "solver-clarabel")]
                {
                    Ok(LpSolverKind::Clarabel)
                }
                #[cfg(not(feature = "solver-clarabel"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}
