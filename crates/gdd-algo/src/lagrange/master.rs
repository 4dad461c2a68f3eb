//! Cutting-plane model of the dual function.
//!
//! Every evaluation `(λk, Zk, res)` of the (concave) dual function yields the
//! supporting hyperplane
//!
//! ```text
//!   η ≤ Zk + Σ_j res_j (λ_j − λk_j)
//! ```
//!
//! The master problem maximizes η over all stored cuts with the multipliers
//! restricted to a box: `[−cp_bound, cp_bound]` for Kelley's method, a trust
//! box around the current point for the bundle method. Cuts are never
//! removed, so the model (and η) only tightens as iterations go on.

#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, variables, Constraint, Expression, ResolutionError, Solution,
    SolverModel, Variable,
};
use serde::Serialize;
use tracing::debug;

use super::registry::MultiplierDomain;
use crate::backend::LpSolverKind;
use crate::error::{LagrangeError, LagrangeResult};

/// Supporting hyperplane `η ≤ constant + gradient·λ`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cut {
    pub iteration: usize,
    pub constant: f64,
    pub gradient: Vec<f64>,
}

impl Cut {
    /// Cut through `(center, value)` with slope `residual`.
    pub fn supporting(iteration: usize, value: f64, center: &[f64], residual: &[f64]) -> Self {
        let offset: f64 = center.iter().zip(residual).map(|(l, r)| l * r).sum();
        Self {
            iteration,
            constant: value - offset,
            gradient: residual.to_vec(),
        }
    }

    pub fn evaluate(&self, lambda: &[f64]) -> f64 {
        self.constant
            + self
                .gradient
                .iter()
                .zip(lambda)
                .map(|(g, l)| g * l)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterSolution {
    pub multipliers: Vec<f64>,
    /// Optimal η: an upper bound on the dual function over the box
    pub eta: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CuttingPlaneMaster {
    cuts: Vec<Cut>,
    domains: Vec<MultiplierDomain>,
    bound: f64,
    solver: LpSolverKind,
}

impl CuttingPlaneMaster {
    pub fn new(domains: Vec<MultiplierDomain>, bound: f64, solver: LpSolverKind) -> Self {
        Self {
            cuts: Vec::new(),
            domains,
            bound,
            solver,
        }
    }

    pub fn add_cut(&mut self, cut: Cut) {
        self.cuts.push(cut);
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn num_cuts(&self) -> usize {
        self.cuts.len()
    }

    /// Kelley box `[−bound, bound]` intersected with each multiplier domain.
    pub fn default_box(&self) -> Vec<(f64, f64)> {
        self.domains
            .iter()
            .map(|d| d.clamp_interval(-self.bound, self.bound))
            .collect()
    }

    /// Bundle trust box `λ_j ± step·|res_j|` intersected with each domain.
    pub fn trust_box(&self, center: &[f64], residual: &[f64], step: f64) -> Vec<(f64, f64)> {
        center
            .iter()
            .zip(residual)
            .zip(&self.domains)
            .map(|((&l, &r), d)| {
                let radius = step * r.abs();
                d.clamp_interval(l - radius, l + radius)
            })
            .collect()
    }

    /// Maximize η over the cuts with multipliers restricted to `bounds`.
    pub fn solve(&self, bounds: &[(f64, f64)]) -> LagrangeResult<MasterSolution> {
        let mut vars = variables!();
        let eta = vars.add(variable().max(self.bound));
        let lambda: Vec<Variable> = bounds
            .iter()
            .map(|&(lo, hi)| vars.add(variable().min(lo).max(hi)))
            .collect();

        let cuts: Vec<Constraint> = self
            .cuts
            .iter()
            .map(|cut| {
                let mut rhs = Expression::from(cut.constant);
                for (&g, &l) in cut.gradient.iter().zip(&lambda) {
                    rhs += g * l;
                }
                constraint!(eta <= rhs)
            })
            .collect();

        let unsolved = vars.maximise(eta);
        let result: Result<MasterSolution, ResolutionError> = match self.solver {
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => {
                let mut model = unsolved.using(clarabel);
                for cut in cuts {
                    model = model.with(cut);
                }
                model
                    .solve()
                    .map(|sol| read_solution(&sol, eta, &lambda))
            }
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => {
                let mut model = unsolved.using(highs);
                for cut in cuts {
                    model = model.with(cut);
                }
                model
                    .solve()
                    .map(|sol| read_solution(&sol, eta, &lambda))
            }
            #[cfg(not(feature = "solver-clarabel"))]
            LpSolverKind::Clarabel => {
                drop((unsolved, cuts));
                return Err(LagrangeError::MasterFailed(
                    "built without the solver-clarabel feature".into(),
                ));
            }
        };

        let solution = result.map_err(|e| match e {
            ResolutionError::Infeasible => {
                LagrangeError::MasterFailed("master problem infeasible".into())
            }
            ResolutionError::Unbounded => {
                LagrangeError::MasterFailed("master problem unbounded".into())
            }
            other => LagrangeError::MasterFailed(other.to_string()),
        })?;

        debug!(
            cuts = self.cuts.len(),
            eta = solution.eta,
            solver = %self.solver,
            "master solved"
        );
        Ok(solution)
    }
}

fn read_solution(sol: &impl Solution, eta: Variable, lambda: &[Variable]) -> MasterSolution {
    MasterSolution {
        multipliers: lambda.iter().map(|&v| sol.value(v)).collect(),
        eta: sol.value(eta),
    }
}
