//! Lagrangian heuristics: primal bounds from the current block solutions.

use gdd_core::{Block, ModelGraph, VarKind};
use tracing::debug;

use super::config::HeuristicKind;
use super::session::DecompositionSession;
use crate::backend::SolverBackend;
use crate::error::{LagrangeError, LagrangeResult};

/// Produces a primal bound (minimization form) from the state of a session.
pub trait LagrangeHeuristic: Send + Sync {
    fn name(&self) -> &str;

    /// Reject a graph/backend pairing before the first iteration.
    fn check(&self, _graph: &ModelGraph, _backend: &dyn SolverBackend) -> LagrangeResult<()> {
        Ok(())
    }

    fn primal_bound(
        &self,
        session: &DecompositionSession<'_>,
        backend: &dyn SolverBackend,
    ) -> LagrangeResult<f64>;
}

/// Fix variables of the given kinds to their rounded block values, then
/// re-solve the flattened model for the rest.
///
/// Integral variables left free by the fixing need a backend that enforces
/// integrality; with a continuous backend the re-solve would only give a
/// relaxation value, so that pairing is rejected with
/// [`LagrangeError::InvalidConfig`]. An infeasible fixing aborts the run with
/// [`LagrangeError::HeuristicFailed`].
#[derive(Debug, Clone)]
pub struct FixVariables {
    kind: HeuristicKind,
}

impl FixVariables {
    pub fn new(kind: HeuristicKind) -> Self {
        Self { kind }
    }

    pub fn binaries() -> Self {
        Self::new(HeuristicKind::FixBinaries)
    }

    pub fn integers() -> Self {
        Self::new(HeuristicKind::FixIntegers)
    }

    fn kinds(&self) -> &'static [VarKind] {
        match self.kind {
            HeuristicKind::FixBinaries => &[VarKind::Binary],
            HeuristicKind::FixIntegers => &[VarKind::Binary, VarKind::Integer],
        }
    }

    fn require_integer_support(
        &self,
        free_integral: usize,
        backend: &dyn SolverBackend,
    ) -> LagrangeResult<()> {
        if free_integral == 0 || backend.supports_integer() {
            return Ok(());
        }
        Err(LagrangeError::InvalidConfig(format!(
            "{} leaves {} integer variable(s) free, but backend '{}' only solves \
             continuous relaxations; use fix-integers",
            self.name(),
            free_integral,
            backend.id()
        )))
    }
}

impl LagrangeHeuristic for FixVariables {
    fn name(&self) -> &str {
        match self.kind {
            HeuristicKind::FixBinaries => "fix-binaries",
            HeuristicKind::FixIntegers => "fix-integers",
        }
    }

    fn check(&self, graph: &ModelGraph, backend: &dyn SolverBackend) -> LagrangeResult<()> {
        if !graph.blocks.iter().any(Block::has_integral) {
            return Ok(());
        }
        let free_integral = graph
            .blocks
            .iter()
            .flat_map(|b| &b.variables)
            .filter(|v| v.is_integral() && !self.kinds().contains(&v.kind))
            .filter(|v| {
                let (lo, hi) = v.bounds();
                lo < hi
            })
            .count();
        self.require_integer_support(free_integral, backend)
    }

    fn primal_bound(
        &self,
        session: &DecompositionSession<'_>,
        backend: &dyn SolverBackend,
    ) -> LagrangeResult<f64> {
        let (problem, fixed) = session
            .flat()
            .with_fixed(self.kinds(), session.block_values());
        let free_integral = problem
            .kinds
            .iter()
            .zip(problem.lower.iter().zip(&problem.upper))
            .filter(|(kind, (lo, hi))| **kind != VarKind::Continuous && lo < hi)
            .count();
        self.require_integer_support(free_integral, backend)?;

        let solution = backend.solve(&problem)?;
        if !solution.status.has_solution() {
            return Err(LagrangeError::HeuristicFailed {
                status: solution.status,
                fixed,
            });
        }
        debug!(
            heuristic = self.name(),
            fixed,
            bound = solution.objective,
            "heuristic bound"
        );
        Ok(solution.objective)
    }
}
