//! Starting multipliers.

use gdd_core::VarKind;
use tracing::info;

use super::config::InitialMultipliers;
use super::session::DecompositionSession;
use crate::backend::{BackendError, SolverBackend};
use crate::error::{LagrangeError, LagrangeResult};

/// Set the session's starting multipliers.
///
/// `Relaxation` solves the flattened model with integrality dropped and
/// takes the duals of the linking rows; it returns the relaxation objective
/// in minimization form.
pub fn initialize_multipliers(
    session: &mut DecompositionSession<'_>,
    method: InitialMultipliers,
    backend: &dyn SolverBackend,
) -> LagrangeResult<Option<f64>> {
    match method {
        InitialMultipliers::Zero => {
            let zeros = vec![0.0; session.registry().len()];
            session.set_multipliers(zeros)?;
            Ok(None)
        }
        InitialMultipliers::Relaxation => {
            let flat = session.flat();
            let mut relaxed = flat.problem().clone();
            relaxed.kinds.fill(VarKind::Continuous);
            let solution = backend.solve(&relaxed)?;
            if !solution.status.has_solution() {
                return Err(LagrangeError::RelaxationFailed(solution.status));
            }
            let lambda = solution
                .duals
                .get(flat.link_rows())
                .ok_or_else(|| {
                    BackendError::Unsupported(format!(
                        "backend '{}' returned {} duals for {} rows",
                        backend.id(),
                        solution.duals.len(),
                        flat.problem().rows.len()
                    ))
                })?
                .to_vec();
            info!(
                objective = solution.objective,
                links = lambda.len(),
                "multipliers initialized from LP relaxation"
            );
            session.set_multipliers(lambda)?;
            Ok(Some(solution.objective))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClarabelBackend, QpProblem, QpSolution};
    use crate::lagrange::config::LagrangeConfig;
    use gdd_core::{LinearTerm, LinkTerm, ModelGraph, Objective, Relation, Variable};

    /// min 2a + b  s.t.  a + b = 4 (linking), a, b ∈ [0, 10]
    /// LP optimum a = 0, b = 4, dual of the link = −1.
    fn graph() -> ModelGraph {
        let mut graph = ModelGraph::new("relax");
        let p = graph.add_block("p");
        let q = graph.add_block("q");
        let a = graph.add_variable(p, Variable::continuous("a", 0.0, 10.0));
        let b = graph.add_variable(q, Variable::continuous("b", 0.0, 10.0));
        graph.set_objective(p, Objective::linear(vec![LinearTerm::new(0, 2.0)]));
        graph.set_objective(q, Objective::linear(vec![LinearTerm::new(0, 1.0)]));
        graph.link(
            "demand",
            vec![LinkTerm::new(a, 1.0), LinkTerm::new(b, 1.0)],
            Relation::Eq,
            4.0,
        );
        graph
    }

    #[test]
    fn test_relaxation_duals() {
        let g = graph();
        let mut session = DecompositionSession::new(&g);
        session.prepare(&LagrangeConfig::default()).unwrap();
        let bound =
            initialize_multipliers(&mut session, InitialMultipliers::Relaxation, &ClarabelBackend::new())
                .unwrap();
        assert!((bound.unwrap() - 4.0).abs() < 1e-5);
        assert!((session.multipliers()[0] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_init() {
        let g = graph();
        let mut session = DecompositionSession::new(&g);
        session.prepare(&LagrangeConfig::default()).unwrap();
        session.set_multipliers(vec![3.0]).unwrap();
        let bound =
            initialize_multipliers(&mut session, InitialMultipliers::Zero, &ClarabelBackend::new())
                .unwrap();
        assert!(bound.is_none());
        assert_eq!(session.multipliers(), &[0.0]);
    }

    /// Solves with Clarabel but reports no duals.
    struct PrimalOnly;

    impl SolverBackend for PrimalOnly {
        fn id(&self) -> &str {
            "primal-only"
        }

        fn supports_quadratic(&self) -> bool {
            true
        }

        fn solve(&self, problem: &QpProblem) -> Result<QpSolution, BackendError> {
            let mut solution = ClarabelBackend::new().solve(problem)?;
            solution.duals.clear();
            Ok(solution)
        }
    }

    #[test]
    fn test_missing_duals_are_an_error() {
        let g = graph();
        let mut session = DecompositionSession::new(&g);
        session.prepare(&LagrangeConfig::default()).unwrap();
        let err = initialize_multipliers(&mut session, InitialMultipliers::Relaxation, &PrimalOnly)
            .unwrap_err();
        assert!(matches!(
            err,
            LagrangeError::Backend(BackendError::Unsupported(_))
        ));
        assert_eq!(session.multipliers(), &[0.0]);
    }
}
