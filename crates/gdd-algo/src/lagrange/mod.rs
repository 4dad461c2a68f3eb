//! # Lagrangian Dual Decomposition
//!
//! Solves a [`ModelGraph`] of independent blocks coupled by linking
//! constraints by dualizing the links. For multipliers `λ` the relaxation
//!
//! ```text
//!   Z(λ) = Σ_b min_{v_b ∈ X_b} [ f_b(v_b) + Σ_i λ_i·(link_i terms of b) ] − Σ_i λ_i·rhs_i
//! ```
//!
//! separates into one subproblem per block. `Z(λ)` is a lower bound on the
//! optimum of a minimization graph; the loop pushes it up by updating `λ`.
//!
//! ## Iteration
//!
//! ```text
//! for k = 1..max_iterations:
//!     stop with "Time Limit" if the wall-clock budget is spent
//!     solve all blocks at λ (plain objective on k = 1, strategy variant after)
//!     Zk  = Σ block Lagrangians − λ·rhs
//!     res = x[:,0] − x[:,1]
//!     record (k, elapsed, Zk, iteration time)
//!     stop with "Optimal" if ‖res‖ < ε
//!     λ   = update(λ, Zk, res)          // runs the Lagrangian heuristic
//! stop with "Max Iterations"
//! ```
//!
//! ## Update strategies
//!
//! - `subgradient`: `λ + α·abs(Zk − ub)/‖res‖² · res`, where `ub` is the
//!   heuristic bound
//! - `optimalstep`: piecewise-linear line search along the same direction,
//!   doubling α while the dual keeps improving
//! - `admm`: `λ + res/‖res‖`; blocks see a quadratic consensus penalty from
//!   the second iteration on. Those sweeps are traced but are not dual bounds,
//!   so only the first one counts toward the best dual bound
//! - `cuttingplanes`: Kelley master over all cuts, `λ ∈ [−cp_bound, cp_bound]`
//! - `bundle`: the same master restricted to `λ ± step·abs(res)`
//!
//! Step methods report the heuristic bound; cut methods report the master η.
//!
//! Maximization graphs are solved in minimization form (objectives times −1)
//! and every reported bound is converted back. Inequality links get
//! sign-restricted multipliers (`≤`: λ ≥ 0, `≥`: λ ≤ 0) and only their
//! violated part counts toward the convergence test.
//!
//! ## References
//!
//! - Geoffrion, "Lagrangean relaxation for integer programming",
//!   Math. Programming Study 2 (1974)
//! - Kelley, "The cutting-plane method for solving convex programs",
//!   J. SIAM 8(4) (1960)

mod config;
mod export;
mod flatten;
mod heuristic;
mod init;
mod master;
mod registry;
mod session;
mod solution;
mod subproblem;
mod update;

pub use config::{HeuristicKind, InitialMultipliers, LagrangeConfig, UpdateMethod};
pub use flatten::{block_problem, FlatModel};
pub use heuristic::{FixVariables, LagrangeHeuristic};
pub use init::initialize_multipliers;
pub use master::{Cut, CuttingPlaneMaster, MasterSolution};
pub use registry::{BlockLink, LinkEntry, LinkRegistry, MultiplierDomain};
pub use session::DecompositionSession;
pub use solution::{
    relative_gap, IterationRecord, LagrangeSolution, SolutionRecorder, TerminationStatus,
};
pub use subproblem::{
    block_objective, dual_value, solve_block, solve_blocks, BlockResult, BlockVariant,
    LagrangianObjective,
};
pub use update::{
    line_search, step_along, subgradient_step, update_multipliers, StepSearch, UpdateOutcome,
};

use std::fmt;
use std::sync::Arc;

use gdd_core::ModelGraph;
use tracing::info;

use crate::backend::{ClarabelBackend, SolverBackend};
use crate::error::{LagrangeError, LagrangeResult};

/// Dual decomposition driver.
///
/// ```no_run
/// use gdd_algo::lagrange::{LagrangeSolver, UpdateMethod};
/// # fn run(graph: &gdd_core::ModelGraph) -> Result<(), gdd_algo::LagrangeError> {
/// let solution = LagrangeSolver::default()
///     .with_method(UpdateMethod::Bundle)
///     .with_max_iterations(50)
///     .solve(graph)?;
/// println!("{} after {} iterations", solution.termination, solution.num_iterations());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LagrangeSolver {
    config: LagrangeConfig,
    backend: Arc<dyn SolverBackend>,
    heuristic: Option<Arc<dyn LagrangeHeuristic>>,
}

impl Default for LagrangeSolver {
    fn default() -> Self {
        Self::new(LagrangeConfig::default())
    }
}

impl fmt::Debug for LagrangeSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LagrangeSolver")
            .field("config", &self.config)
            .field("backend", &self.backend.id())
            .field(
                "heuristic",
                &self.heuristic.as_ref().map(|h| h.name().to_string()),
            )
            .finish()
    }
}

impl LagrangeSolver {
    pub fn new(config: LagrangeConfig) -> Self {
        Self {
            config,
            backend: Arc::new(ClarabelBackend::default()),
            heuristic: None,
        }
    }

    pub fn config(&self) -> &LagrangeConfig {
        &self.config
    }

    pub fn with_backend(mut self, backend: impl SolverBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    /// Replace the configured fix-variables heuristic.
    pub fn with_heuristic(mut self, heuristic: impl LagrangeHeuristic + 'static) -> Self {
        self.heuristic = Some(Arc::new(heuristic));
        self
    }

    pub fn with_method(mut self, method: UpdateMethod) -> Self {
        self.config.update_method = method;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Wall-clock budget in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.config.time_limit = seconds;
        self
    }

    pub fn with_heuristic_kind(mut self, kind: HeuristicKind) -> Self {
        self.config.heuristic = kind;
        self
    }

    pub fn with_initial_multipliers(mut self, init: InitialMultipliers) -> Self {
        self.config.initial_multipliers = init;
        self
    }

    /// Solve `graph` in a fresh session.
    pub fn solve(&self, graph: &ModelGraph) -> LagrangeResult<LagrangeSolution> {
        let mut session = DecompositionSession::new(graph);
        self.solve_session(&mut session)
    }

    /// Run the loop on an existing session, preparing it first if needed.
    pub fn solve_session(
        &self,
        session: &mut DecompositionSession<'_>,
    ) -> LagrangeResult<LagrangeSolution> {
        let config = &self.config;
        config.validate()?;
        let method = config.update_method;
        if method == UpdateMethod::Admm && !self.backend.supports_quadratic() {
            return Err(LagrangeError::InvalidConfig(format!(
                "backend '{}' cannot solve the quadratic ADMM subproblems",
                self.backend.id()
            )));
        }

        session.prepare(config)?;
        let backend = self.backend.as_ref();
        let default_heuristic;
        let heuristic: &dyn LagrangeHeuristic = match &self.heuristic {
            Some(custom) => custom.as_ref(),
            None => {
                default_heuristic = FixVariables::new(config.heuristic);
                &default_heuristic
            }
        };
        heuristic.check(session.graph(), backend)?;

        let mut recorder = SolutionRecorder::new();
        let relaxation = initialize_multipliers(session, config.initial_multipliers, backend)?;
        recorder.set_relaxation_bound(relaxation);

        info!(
            method = %method,
            backend = backend.id(),
            heuristic = heuristic.name(),
            max_iterations = config.max_iterations,
            "starting dual decomposition"
        );

        let mut termination = TerminationStatus::MaxIterations;
        for iteration in 1..=config.max_iterations {
            if recorder.elapsed().as_secs_f64() >= config.time_limit {
                info!(iteration, "time limit reached");
                termination = TerminationStatus::TimeLimit;
                break;
            }
            recorder.begin_iteration();

            let variant = self.block_variant(iteration);
            let results = solve_blocks(
                session,
                session.multipliers(),
                session.value_matrix(),
                variant,
                backend,
            )?;
            let zk = session.absorb(&results);
            // penalized sweeps do not bound the dual function
            if variant == BlockVariant::Plain {
                session.track_dual(zk, config);
            }

            let record = recorder.record(iteration, session);
            info!(
                iteration,
                dual = record.dual_bound,
                residual = record.residual_norm,
                alpha = record.alpha,
                "lagrangian iteration"
            );

            if session.residual_norm() < config.epsilon {
                termination = TerminationStatus::Optimal;
                break;
            }

            let outcome =
                update_multipliers(session, method, iteration, heuristic, backend, config)?;
            recorder.set_last_bound(outcome.bound);
            session.set_multipliers(outcome.multipliers)?;
        }

        let solution = recorder.finish(termination, method, session);
        info!(
            status = %solution.termination,
            iterations = solution.num_iterations(),
            dual_bound = ?solution.dual_bound,
            primal_bound = ?solution.primal_bound,
            time_ms = solution.solve_time_ms,
            "dual decomposition finished"
        );
        Ok(solution)
    }

    /// Objective variant of the block solves in `iteration` (1-based).
    fn block_variant(&self, iteration: usize) -> BlockVariant {
        match self.config.update_method {
            UpdateMethod::Admm if iteration > 1 => BlockVariant::Admm {
                penalty: self.config.admm_penalty,
            },
            _ => BlockVariant::Plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admm_variant_skips_first_iteration() {
        let solver = LagrangeSolver::default().with_method(UpdateMethod::Admm);
        assert_eq!(solver.block_variant(1), BlockVariant::Plain);
        assert_eq!(
            solver.block_variant(2),
            BlockVariant::Admm { penalty: 1.0 }
        );
        let plain = LagrangeSolver::default().with_method(UpdateMethod::Bundle);
        assert_eq!(plain.block_variant(5), BlockVariant::Plain);
    }

    #[test]
    fn test_invalid_config_fails_before_solving() {
        let graph = ModelGraph::new("empty");
        let err = LagrangeSolver::default()
            .with_epsilon(-1.0)
            .solve(&graph)
            .unwrap_err();
        assert!(matches!(err, LagrangeError::InvalidConfig(_)));
    }

    #[test]
    fn test_debug_shows_backend() {
        let text = format!("{:?}", LagrangeSolver::default());
        assert!(text.contains("clarabel"));
    }
}
