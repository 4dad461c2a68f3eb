//! Per-iteration trace and final result of a decomposition run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use super::config::UpdateMethod;
use super::session::DecompositionSession;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationStatus {
    /// Residual norm fell below epsilon
    #[serde(rename = "Optimal")]
    Optimal,
    #[serde(rename = "Max Iterations")]
    MaxIterations,
    #[serde(rename = "Time Limit")]
    TimeLimit,
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationStatus::Optimal => write!(f, "Optimal"),
            TerminationStatus::MaxIterations => write!(f, "Max Iterations"),
            TerminationStatus::TimeLimit => write!(f, "Time Limit"),
        }
    }
}

/// One row of the iteration trace. Objective values are in the graph's own
/// sense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Seconds since the run started
    pub elapsed_secs: f64,
    pub dual_bound: f64,
    pub iteration_secs: f64,
    /// Best primal bound known when the row was written
    pub primal_bound: Option<f64>,
    pub residual_norm: f64,
    pub alpha: f64,
}

/// Result of [`LagrangeSolver::solve`](super::LagrangeSolver::solve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagrangeSolution {
    pub termination: TerminationStatus,
    pub method: UpdateMethod,
    pub iterations: Vec<IterationRecord>,
    /// Best dual bound, in the graph's sense. `None` when no unpenalized
    /// sweep ran.
    pub dual_bound: Option<f64>,
    /// Best heuristic bound, in the graph's sense
    pub primal_bound: Option<f64>,
    /// `|primal − dual| / max(|primal|, 1e-10)`
    pub gap: Option<f64>,
    /// Bound from the last update (heuristic or master η), in the graph's sense
    pub last_bound: Option<f64>,
    pub relaxation_bound: Option<f64>,
    pub multipliers: Vec<f64>,
    pub residual: Vec<f64>,
    pub residual_norm: f64,
    /// Block variable values of the last sweep
    pub block_values: Vec<Vec<f64>>,
    pub num_cuts: usize,
    pub solve_time_ms: u128,
}

impl LagrangeSolution {
    pub fn converged(&self) -> bool {
        self.termination == TerminationStatus::Optimal
    }

    pub fn num_iterations(&self) -> usize {
        self.iterations.len()
    }
}

/// Relative gap between a primal and a dual bound.
pub fn relative_gap(primal: f64, dual: f64) -> f64 {
    (primal - dual).abs() / primal.abs().max(1e-10)
}

/// Accumulates the iteration trace of a run and builds the final
/// [`LagrangeSolution`].
#[derive(Debug)]
pub struct SolutionRecorder {
    start: Instant,
    iteration_start: Instant,
    records: Vec<IterationRecord>,
    last_bound: Option<f64>,
    relaxation_bound: Option<f64>,
}

impl Default for SolutionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SolutionRecorder {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            iteration_start: now,
            records: Vec::new(),
            last_bound: None,
            relaxation_bound: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn begin_iteration(&mut self) {
        self.iteration_start = Instant::now();
    }

    /// Append the record of `iteration` from the session state after a sweep.
    pub fn record(&mut self, iteration: usize, session: &DecompositionSession<'_>) -> &IterationRecord {
        let n = session.normalization();
        self.records.push(IterationRecord {
            iteration,
            elapsed_secs: self.start.elapsed().as_secs_f64(),
            dual_bound: n * session.dual_value(),
            iteration_secs: self.iteration_start.elapsed().as_secs_f64(),
            primal_bound: session.best_primal().map(|p| n * p),
            residual_norm: session.residual_norm(),
            alpha: session.alpha(),
        });
        &self.records[self.records.len() - 1]
    }

    /// Bound returned by the latest update, in minimization form.
    pub fn set_last_bound(&mut self, bound: f64) {
        self.last_bound = Some(bound);
    }

    /// Relaxation objective from multiplier initialization, in minimization form.
    pub fn set_relaxation_bound(&mut self, bound: Option<f64>) {
        self.relaxation_bound = bound;
    }

    pub fn finish(
        self,
        termination: TerminationStatus,
        method: UpdateMethod,
        session: &DecompositionSession<'_>,
    ) -> LagrangeSolution {
        let n = session.normalization();
        let dual = session.best_dual().map(|d| n * d);
        let primal = session.best_primal().map(|p| n * p);
        LagrangeSolution {
            termination,
            method,
            iterations: self.records,
            dual_bound: dual,
            primal_bound: primal,
            gap: primal.zip(dual).map(|(p, d)| relative_gap(p, d)),
            last_bound: self.last_bound.map(|b| n * b),
            relaxation_bound: self.relaxation_bound.map(|b| n * b),
            multipliers: session.multipliers().to_vec(),
            residual: session.residual().to_vec(),
            residual_norm: session.residual_norm(),
            block_values: session.block_values().to_vec(),
            num_cuts: session.master().num_cuts(),
            solve_time_ms: self.start.elapsed().as_millis(),
        }
    }
}
