//! Multiplier update strategies.
//!
//! All strategies work in minimization form, where the dual function
//! `Z(λ)` is concave and `res` is a supergradient at the current point.

use tracing::{debug, warn};

use super::config::{LagrangeConfig, UpdateMethod};
use super::heuristic::LagrangeHeuristic;
use super::master::Cut;
use super::registry::LinkRegistry;
use super::session::DecompositionSession;
use super::subproblem::{dual_value, solve_blocks, BlockVariant};
use crate::backend::SolverBackend;
use crate::error::LagrangeResult;

/// Result of one multiplier update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub multipliers: Vec<f64>,
    /// Heuristic bound for step methods, master η for cut methods
    pub bound: f64,
    /// Primal bound from the heuristic
    pub primal_bound: f64,
    /// Distance along the residual the multipliers moved, per unit residual
    pub step: f64,
}

/// `α·|Zk − bound| / ‖res‖²`, or zero for a zero residual.
pub fn subgradient_step(alpha: f64, zk: f64, bound: f64, res: &[f64]) -> f64 {
    let norm_sq: f64 = res.iter().map(|r| r * r).sum();
    if norm_sq <= 0.0 {
        return 0.0;
    }
    alpha * (zk - bound).abs() / norm_sq
}

/// `project(λ + step·res)`.
pub fn step_along(registry: &LinkRegistry, lambda: &[f64], res: &[f64], step: f64) -> Vec<f64> {
    let mut next: Vec<f64> = lambda
        .iter()
        .zip(res)
        .map(|(l, r)| l + step * r)
        .collect();
    registry.project(&mut next);
    next
}

/// Decision of one round of the optimal-step search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSearch {
    /// Both probes still descend: retry with a doubled α
    Expand,
    /// Step multiplier where the two probe lines intersect
    Step(f64),
}

/// Piecewise-linear line search on `h(a) = −Z(λ + a·base·res)`.
///
/// `h1 = h(0)`, `h2 = h(Δ)`, `h3 = h(α)`, `h4 = h(α + Δ)`. The lines through
/// the two probe pairs are intersected; if both slopes are negative the
/// minimum lies beyond α.
pub fn line_search(h: [f64; 4], alpha: f64, probe: f64) -> StepSearch {
    let [h1, h2, h3, h4] = h;
    let s1 = (h2 - h1) / probe;
    let s2 = (h4 - h3) / probe;
    if s1 < 0.0 && s2 < 0.0 {
        return StepSearch::Expand;
    }
    if s1 >= s2 {
        return StepSearch::Step(alpha);
    }
    let a = (h3 - s2 * alpha - h1) / (s1 - s2);
    StepSearch::Step(a.clamp(0.0, alpha + probe))
}

/// `−Z` at `project(λ + step·res)` from a full plain block sweep. The
/// session state is left untouched.
fn negated_dual(
    session: &DecompositionSession<'_>,
    lambda: &[f64],
    res: &[f64],
    step: f64,
    backend: &dyn SolverBackend,
) -> LagrangeResult<f64> {
    let trial = step_along(session.registry(), lambda, res, step);
    let results = solve_blocks(
        session,
        &trial,
        session.value_matrix(),
        BlockVariant::Plain,
        backend,
    )?;
    Ok(-dual_value(&results, &trial, &session.registry().rhs()))
}

fn optimal_step(
    session: &mut DecompositionSession<'_>,
    primal: f64,
    backend: &dyn SolverBackend,
    config: &LagrangeConfig,
) -> LagrangeResult<UpdateOutcome> {
    let zk = session.dual_value();
    let lambda = session.multipliers().to_vec();
    let res = session.residual().to_vec();
    let base = subgradient_step(1.0, zk, primal, &res);
    let probe = config.step_probe;

    let h1 = -zk;
    let h2 = negated_dual(session, &lambda, &res, probe * base, backend)?;
    let mut alpha = session.alpha();

    for _ in 0..=config.max_step_doublings {
        let h3 = negated_dual(session, &lambda, &res, alpha * base, backend)?;
        let h4 = negated_dual(session, &lambda, &res, (alpha + probe) * base, backend)?;
        match line_search([h1, h2, h3, h4], alpha, probe) {
            StepSearch::Expand => {
                debug!(alpha, "both probes descend, doubling step factor");
                alpha *= 2.0;
            }
            StepSearch::Step(a) => {
                session.set_alpha(alpha);
                let step = a * base;
                return Ok(UpdateOutcome {
                    multipliers: step_along(session.registry(), &lambda, &res, step),
                    bound: primal,
                    primal_bound: primal,
                    step,
                });
            }
        }
    }

    warn!(
        doublings = config.max_step_doublings,
        "optimal step search did not bracket a minimum, taking a subgradient step"
    );
    let step = subgradient_step(session.alpha(), zk, primal, &res);
    Ok(UpdateOutcome {
        multipliers: step_along(session.registry(), &lambda, &res, step),
        bound: primal,
        primal_bound: primal,
        step,
    })
}

/// Compute the next multipliers with `method`.
///
/// The heuristic runs first on every strategy; its bound is the Polyak
/// target of the step methods and the reported primal bound of all of them.
pub fn update_multipliers(
    session: &mut DecompositionSession<'_>,
    method: UpdateMethod,
    iteration: usize,
    heuristic: &dyn LagrangeHeuristic,
    backend: &dyn SolverBackend,
    config: &LagrangeConfig,
) -> LagrangeResult<UpdateOutcome> {
    let primal = heuristic.primal_bound(session, backend)?;
    session.track_primal(primal);

    let zk = session.dual_value();
    let lambda = session.multipliers().to_vec();
    let res = session.residual().to_vec();

    let outcome = match method {
        UpdateMethod::Subgradient => {
            let step = subgradient_step(session.alpha(), zk, primal, &res);
            UpdateOutcome {
                multipliers: step_along(session.registry(), &lambda, &res, step),
                bound: primal,
                primal_bound: primal,
                step,
            }
        }
        UpdateMethod::OptimalStep => optimal_step(session, primal, backend, config)?,
        UpdateMethod::Admm => {
            let norm = res.iter().map(|r| r * r).sum::<f64>().sqrt();
            let step = if norm > 0.0 { 1.0 / norm } else { 0.0 };
            UpdateOutcome {
                multipliers: step_along(session.registry(), &lambda, &res, step),
                bound: primal,
                primal_bound: primal,
                step,
            }
        }
        UpdateMethod::CuttingPlanes => {
            let master = session.master_mut();
            master.add_cut(Cut::supporting(iteration, zk, &lambda, &res));
            let solution = master.solve(&master.default_box())?;
            UpdateOutcome {
                multipliers: solution.multipliers,
                bound: solution.eta,
                primal_bound: primal,
                step: 0.0,
            }
        }
        UpdateMethod::Bundle => {
            let step = subgradient_step(session.alpha(), zk, primal, &res);
            let master = session.master_mut();
            master.add_cut(Cut::supporting(iteration, zk, &lambda, &res));
            let trust = master.trust_box(&lambda, &res, step);
            let solution = master.solve(&trust)?;
            UpdateOutcome {
                multipliers: solution.multipliers,
                bound: solution.eta,
                primal_bound: primal,
                step,
            }
        }
    };

    debug!(
        method = %method,
        bound = outcome.bound,
        primal = outcome.primal_bound,
        step = outcome.step,
        "multipliers updated"
    );
    Ok(outcome)
}
