//! Block subproblems of the Lagrangian relaxation.
//!
//! Block `b` solves
//!
//! ```text
//!   min  f_b(v) + Σ_{i ∈ links(b)} λ_i · Σ_{terms of b in i} coef·v
//!        [+ Σ_i ½ρ (side_i(v) − target_i)²]      ADMM variant only
//! ```
//!
//! The `−λ_i·rhs_i` part of the Lagrangian is added once by the caller, and
//! the ADMM penalty never enters the reported Lagrangian value.

use std::time::Duration;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

use gdd_core::{Block, LinearTerm, Objective, QuadTerm};

use super::flatten::block_problem;
use super::registry::{BlockLink, LinkRegistry};
use super::session::DecompositionSession;
use crate::backend::{SolveStatus, SolverBackend};
use crate::error::{LagrangeError, LagrangeResult};

/// Objective variant used for a block solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockVariant {
    /// Objective plus dualized link terms
    Plain,
    /// Plain objective plus a quadratic consensus penalty of weight `penalty`
    Admm { penalty: f64 },
}

/// Outcome of one block solve.
#[derive(Debug, Clone)]
pub struct BlockResult {
    pub block: usize,
    pub values: Vec<f64>,
    /// Normalized block objective at `values`
    pub objective: f64,
    /// Objective plus dualized terms, without the ADMM penalty
    pub lagrangian: f64,
    /// `(link, slot, Σ coef·v)` for every link of the block
    pub sides: Vec<(usize, usize, f64)>,
    pub solve_time: Duration,
}

/// Lagrangian objective of one block.
#[derive(Debug, Clone)]
pub struct LagrangianObjective {
    objective: Objective,
}

impl LagrangianObjective {
    pub fn new(pristine: &Objective) -> Self {
        Self {
            objective: pristine.clone(),
        }
    }

    /// Add `λ·Σ coef·v` for one link side.
    pub fn dualize(mut self, link: &BlockLink, lambda: f64) -> Self {
        if lambda != 0.0 {
            self.objective.linear.extend(
                link.terms
                    .iter()
                    .map(|&(v, c)| LinearTerm::new(v, lambda * c)),
            );
        }
        self
    }

    /// Add `½ρ (Σ a_k v_k − target)²` expanded into quadratic, linear and
    /// constant parts.
    pub fn penalize(mut self, link: &BlockLink, target: f64, rho: f64) -> Self {
        let terms = &link.terms;
        for (p, &(vp, ap)) in terms.iter().enumerate() {
            self.objective
                .quadratic
                .push(QuadTerm::new(vp, vp, 0.5 * rho * ap * ap));
            for &(vq, aq) in &terms[p + 1..] {
                self.objective
                    .quadratic
                    .push(QuadTerm::new(vp, vq, rho * ap * aq));
            }
            self.objective
                .linear
                .push(LinearTerm::new(vp, -rho * target * ap));
        }
        self.objective.constant += 0.5 * rho * target * target;
        self
    }

    pub fn into_objective(self) -> Objective {
        self.objective
    }
}

/// Build the objective block `index` is solved with.
pub fn block_objective(
    pristine: &Objective,
    links: &[BlockLink],
    registry: &LinkRegistry,
    lambda: &[f64],
    x: &[[f64; 2]],
    variant: BlockVariant,
) -> Objective {
    let mut objective = LagrangianObjective::new(pristine);
    for link in links {
        objective = objective.dualize(link, lambda[link.link]);
        if let BlockVariant::Admm { penalty } = variant {
            let target = registry.consensus_target(link.link, link.slot, x);
            objective = objective.penalize(link, target, penalty);
        }
    }
    objective.into_objective()
}

/// Solve one block at multipliers `lambda`.
#[allow(clippy::too_many_arguments)]
pub fn solve_block(
    index: usize,
    block: &Block,
    pristine: &Objective,
    registry: &LinkRegistry,
    lambda: &[f64],
    x: &[[f64; 2]],
    variant: BlockVariant,
    backend: &dyn SolverBackend,
) -> LagrangeResult<BlockResult> {
    let links = registry.block_links(index);
    let objective = block_objective(pristine, links, registry, lambda, x, variant);
    let problem = block_problem(block, &objective);
    let solution = backend.solve(&problem)?;

    if !solution.status.has_solution() {
        return Err(LagrangeError::SubproblemFailed {
            block: index,
            name: block.name.clone(),
            status: solution.status,
        });
    }
    if solution.status != SolveStatus::Optimal {
        warn!(block = index, status = %solution.status, "block solve not proven optimal");
    }

    let values = solution.values;
    let objective_value = pristine.evaluate(&values);
    let mut lagrangian = objective_value;
    let sides = links
        .iter()
        .map(|link| {
            let side = link.side_value(&values);
            lagrangian += lambda[link.link] * side;
            (link.link, link.slot, side)
        })
        .collect();

    debug!(
        block = index,
        objective = objective_value,
        lagrangian,
        time_ms = solution.solve_time.as_secs_f64() * 1e3,
        "block solved"
    );

    Ok(BlockResult {
        block: index,
        values,
        objective: objective_value,
        lagrangian,
        sides,
        solve_time: solution.solve_time,
    })
}

/// Solve every block of `session` at `lambda`, in parallel when the
/// `parallel` feature is on. Results come back in block order.
pub fn solve_blocks(
    session: &DecompositionSession<'_>,
    lambda: &[f64],
    x: &[[f64; 2]],
    variant: BlockVariant,
    backend: &dyn SolverBackend,
) -> LagrangeResult<Vec<BlockResult>> {
    let blocks = &session.graph().blocks;
    let objectives = session.objectives();
    let registry = session.registry();

    #[cfg(feature = "parallel")]
    let results = (0..blocks.len())
        .into_par_iter()
        .map(|b| {
            solve_block(
                b,
                &blocks[b],
                &objectives[b],
                registry,
                lambda,
                x,
                variant,
                backend,
            )
        })
        .collect::<LagrangeResult<Vec<_>>>();

    #[cfg(not(feature = "parallel"))]
    let results = (0..blocks.len())
        .map(|b| {
            solve_block(
                b,
                &blocks[b],
                &objectives[b],
                registry,
                lambda,
                x,
                variant,
                backend,
            )
        })
        .collect::<LagrangeResult<Vec<_>>>();

    results
}

/// `Σ_b L_b − Σ_i λ_i·rhs_i`: the Lagrangian dual value of a full sweep.
pub fn dual_value(results: &[BlockResult], lambda: &[f64], rhs: &[f64]) -> f64 {
    let blocks: f64 = results.iter().map(|r| r.lagrangian).sum();
    let constant: f64 = lambda.iter().zip(rhs).map(|(l, r)| l * r).sum();
    blocks - constant
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdd_core::{LinkTerm, ModelGraph, Relation, Variable};

    fn pair() -> (ModelGraph, LinkRegistry) {
        let mut graph = ModelGraph::new("pair");
        let a = graph.add_block("a");
        let b = graph.add_block("b");
        let xa = graph.add_variable(a, Variable::continuous("xa", 0.0, 10.0));
        let xb = graph.add_variable(b, Variable::continuous("xb", 0.0, 10.0));
        graph.set_objective(a, Objective::linear(vec![LinearTerm::new(0, 1.0)]));
        graph.set_objective(b, Objective::linear(vec![LinearTerm::new(0, 1.0)]));
        graph.link(
            "eq",
            vec![LinkTerm::new(xa, 1.0), LinkTerm::new(xb, -1.0)],
            Relation::Eq,
            0.0,
        );
        let registry = LinkRegistry::build(&graph).unwrap();
        (graph, registry)
    }

    #[test]
    fn test_plain_objective_adds_dual_terms_only() {
        let (graph, registry) = pair();
        let lambda = vec![0.5];
        let x = vec![[3.0, 1.0]];
        let obj = block_objective(
            &graph.blocks[0].objective,
            registry.block_links(0),
            &registry,
            &lambda,
            &x,
            BlockVariant::Plain,
        );
        assert!(!obj.is_quadratic());
        assert_eq!(obj.evaluate(&[2.0]), 2.0 + 0.5 * 2.0);
    }

    #[test]
    fn test_penalty_expansion_matches_square() {
        let link = BlockLink {
            link: 0,
            slot: 0,
            terms: vec![(0, 2.0), (1, -1.0)],
        };
        let obj = LagrangianObjective::new(&Objective::default())
            .penalize(&link, 3.0, 4.0)
            .into_objective();
        let v = [1.5, 0.25];
        let side = 2.0 * v[0] - v[1];
        let expected = 0.5 * 4.0 * (side - 3.0) * (side - 3.0);
        assert!((obj.evaluate(&v) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_admm_target_uses_other_side() {
        let (graph, registry) = pair();
        let lambda = vec![0.0];
        let x = vec![[3.0, 1.0]];
        let obj = block_objective(
            &graph.blocks[0].objective,
            registry.block_links(0),
            &registry,
            &lambda,
            &x,
            BlockVariant::Admm { penalty: 1.0 },
        );
        // block a owns slot 0; its target is x[0][1] = 1
        assert!(obj.is_quadratic());
        assert!((obj.evaluate(&[1.0]) - 1.0).abs() < 1e-12);
        assert!((obj.evaluate(&[3.0]) - (3.0 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_dual_value_subtracts_rhs_once() {
        let results = vec![
            BlockResult {
                block: 0,
                values: vec![],
                objective: 1.0,
                lagrangian: 2.0,
                sides: vec![],
                solve_time: Duration::ZERO,
            },
            BlockResult {
                block: 1,
                values: vec![],
                objective: 3.0,
                lagrangian: 4.0,
                sides: vec![],
                solve_time: Duration::ZERO,
            },
        ];
        assert_eq!(dual_value(&results, &[2.0], &[1.5]), 6.0 - 3.0);
    }
}
