//! # gdd-algo: Lagrangian Dual Decomposition
//!
//! Solves block-structured optimization models ([`gdd_core::ModelGraph`]) by
//! dualizing the constraints that link blocks together and iterating on the
//! multipliers.
//!
//! | Method | Update | Bound reported |
//! |--------|--------|----------------|
//! | [`UpdateMethod::Subgradient`] | Polyak step along the residual | Heuristic |
//! | [`UpdateMethod::OptimalStep`] | Line search along the residual | Heuristic |
//! | [`UpdateMethod::Admm`] | Normalized residual step, penalized blocks | Heuristic |
//! | [`UpdateMethod::CuttingPlanes`] | Kelley cutting-plane master | Master η |
//! | [`UpdateMethod::Bundle`] | Cutting planes inside a trust box | Master η |
//!
//! ### Architecture
//!
//! - **[`backend::SolverBackend`]**: solves one block, or the flattened model,
//!   given as a [`backend::QpProblem`]. [`backend::ClarabelBackend`] is the
//!   default.
//! - **[`lagrange::DecompositionSession`]**: link registry, multipliers, value
//!   matrix and cut model of one run.
//! - **[`lagrange::LagrangeHeuristic`]**: primal bounds from block solutions.
//! - **[`LagrangeSolver`]**: the iteration loop.
//!
//! Block subproblems of an iteration are independent and solved on the rayon
//! thread pool (feature `parallel`, on by default).
//!
//! ## Example
//!
//! ```ignore
//! use gdd_algo::{LagrangeSolver, UpdateMethod};
//! use gdd_core::load_graph;
//!
//! let graph = load_graph("two_plants.json")?;
//! let solution = LagrangeSolver::default()
//!     .with_method(UpdateMethod::CuttingPlanes)
//!     .solve(&graph)?;
//! println!("{}: dual bound {:?}", solution.termination, solution.dual_bound);
//! ```

pub mod backend;
pub mod error;
pub mod lagrange;

pub use backend::{ClarabelBackend, LpSolverKind, QpProblem, QpSolution, SolveStatus, SolverBackend};
pub use error::{LagrangeError, LagrangeResult};
pub use lagrange::{
    HeuristicKind, InitialMultipliers, IterationRecord, LagrangeConfig, LagrangeSolution,
    LagrangeSolver, TerminationStatus, UpdateMethod,
};
