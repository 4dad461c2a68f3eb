//! State of one decomposition run over a [`ModelGraph`].
//!
//! The session owns everything the loop mutates: multipliers, the value
//! matrix `x`, residuals, the latest block solutions, α with its stall
//! counter, and the cutting-plane model. Objectives are stored in
//! minimization form (multiplied by the sense sign); reported bounds are
//! multiplied back by [`DecompositionSession::normalization`].

use gdd_core::{ModelGraph, Objective};
use tracing::{debug, info};

use super::config::LagrangeConfig;
use super::flatten::FlatModel;
use super::master::CuttingPlaneMaster;
use super::registry::LinkRegistry;
use super::subproblem::{dual_value, BlockResult};
use crate::error::{LagrangeError, LagrangeResult};

/// Relative tolerance for counting a dual value as an improvement.
const IMPROVEMENT_TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct DecompositionSession<'g> {
    graph: &'g ModelGraph,
    prepared: bool,
    normalization: f64,
    objectives: Vec<Objective>,
    registry: LinkRegistry,
    flat: FlatModel,
    master: CuttingPlaneMaster,

    lambda: Vec<f64>,
    x: Vec<[f64; 2]>,
    res: Vec<f64>,
    block_values: Vec<Vec<f64>>,
    zk: f64,

    alpha: f64,
    no_improve: usize,
    best_dual: f64,
    best_primal: f64,
}

impl<'g> DecompositionSession<'g> {
    /// Unprepared session; call [`prepare`](Self::prepare) before solving.
    pub fn new(graph: &'g ModelGraph) -> Self {
        Self {
            graph,
            prepared: false,
            normalization: graph.sense.sign(),
            objectives: Vec::new(),
            registry: LinkRegistry::default(),
            flat: FlatModel::default(),
            master: CuttingPlaneMaster::default(),
            lambda: Vec::new(),
            x: Vec::new(),
            res: Vec::new(),
            block_values: Vec::new(),
            zk: f64::NEG_INFINITY,
            alpha: 0.0,
            no_improve: 0,
            best_dual: f64::NEG_INFINITY,
            best_primal: f64::INFINITY,
        }
    }

    /// Validate the graph, register links and size all state. Calling it
    /// again on a prepared session does nothing.
    pub fn prepare(&mut self, config: &LagrangeConfig) -> LagrangeResult<()> {
        if self.prepared {
            debug!("session already prepared");
            return Ok(());
        }

        let graph = self.graph;
        graph.validate()?;

        self.normalization = graph.sense.sign();
        self.objectives = graph
            .blocks
            .iter()
            .map(|b| b.objective.scaled(self.normalization))
            .collect();
        self.registry = LinkRegistry::build(graph)?;
        self.flat = FlatModel::build(graph, &self.objectives);
        self.master = CuttingPlaneMaster::new(
            self.registry.domains(),
            config.cp_bound,
            config.master_solver,
        );

        let n_links = self.registry.len();
        self.lambda = vec![0.0; n_links];
        self.x = vec![[0.0; 2]; n_links];
        self.res = vec![0.0; n_links];
        self.block_values = graph
            .blocks
            .iter()
            .map(|b| vec![0.0; b.num_variables()])
            .collect();
        self.alpha = config.alpha;
        self.prepared = true;

        info!(
            blocks = graph.num_blocks(),
            links = n_links,
            variables = graph.num_variables(),
            "decomposition prepared"
        );
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn graph(&self) -> &'g ModelGraph {
        self.graph
    }

    /// `+1` for minimization graphs, `−1` for maximization graphs.
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    /// Block objectives in minimization form.
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn flat(&self) -> &FlatModel {
        &self.flat
    }

    pub fn master(&self) -> &CuttingPlaneMaster {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut CuttingPlaneMaster {
        &mut self.master
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.lambda
    }

    /// Replace the multipliers, projecting them onto their domains.
    pub fn set_multipliers(&mut self, mut lambda: Vec<f64>) -> LagrangeResult<()> {
        if lambda.len() != self.registry.len() {
            return Err(LagrangeError::InvalidConfig(format!(
                "expected {} multipliers, got {}",
                self.registry.len(),
                lambda.len()
            )));
        }
        self.registry.project(&mut lambda);
        self.lambda = lambda;
        Ok(())
    }

    pub fn value_matrix(&self) -> &[[f64; 2]] {
        &self.x
    }

    pub fn residual(&self) -> &[f64] {
        &self.res
    }

    /// Norm used for the convergence test (satisfied inequalities count as 0).
    pub fn residual_norm(&self) -> f64 {
        self.registry.violation_norm(&self.res)
    }

    pub fn block_values(&self) -> &[Vec<f64>] {
        &self.block_values
    }

    /// Dual value of the latest sweep, in minimization form.
    pub fn dual_value(&self) -> f64 {
        self.zk
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    /// Best dual bound so far, in minimization form.
    pub fn best_dual(&self) -> Option<f64> {
        self.best_dual.is_finite().then_some(self.best_dual)
    }

    /// Best primal bound so far, in minimization form.
    pub fn best_primal(&self) -> Option<f64> {
        self.best_primal.is_finite().then_some(self.best_primal)
    }

    /// Store a full sweep: block values, the value matrix, residuals and the
    /// dual value. Returns the dual value.
    pub fn absorb(&mut self, results: &[BlockResult]) -> f64 {
        for result in results {
            for &(link, slot, side) in &result.sides {
                self.x[link][slot] = self.registry.slot_value(link, slot, side);
            }
            self.block_values[result.block] = result.values.clone();
        }
        self.res = self.registry.residual(&self.x);
        self.zk = dual_value(results, &self.lambda, &self.registry.rhs());
        self.zk
    }

    /// Track the best dual value and shrink α by `delta` after
    /// `max_no_improve` consecutive iterations without improvement. Returns
    /// whether `zk` improved on the best value.
    pub fn track_dual(&mut self, zk: f64, config: &LagrangeConfig) -> bool {
        let tol = IMPROVEMENT_TOL * self.best_dual.abs().max(1.0);
        let improved = !self.best_dual.is_finite() || zk > self.best_dual + tol;
        if improved {
            self.best_dual = zk;
            self.no_improve = 0;
            return true;
        }

        self.no_improve += 1;
        if self.no_improve >= config.max_no_improve {
            let shrunk = self.alpha * config.delta;
            debug!(
                from = self.alpha,
                to = shrunk,
                stalled = self.no_improve,
                "shrinking step factor"
            );
            self.alpha = shrunk;
            self.no_improve = 0;
        }
        false
    }

    pub fn track_primal(&mut self, bound: f64) {
        if bound < self.best_primal {
            self.best_primal = bound;
        }
    }
}
