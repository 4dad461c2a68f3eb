//! Interior-point backend built on Clarabel.
//!
//! Clarabel solves
//!
//! ```text
//!   minimize    (1/2)x'Px + q'x
//!   subject to  Ax + s = b,  s ∈ K
//! ```
//!
//! Equality rows and fixed variables go to the zero cone, everything else is
//! written as `a·x ≤ b` and goes to the nonnegative cone. Integer markers are
//! ignored: integral variables are solved as their continuous relaxation, so
//! the backend reports no integer support.

use std::collections::BTreeMap;

use ::clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use gdd_core::Relation;
use tracing::debug;
use web_time::Instant;

use super::{BackendError, QpProblem, QpSolution, SolveStatus, SolverBackend};

/// Row of `Ax + s = b` together with the original row it came from.
struct ConeRow {
    terms: Vec<(usize, f64)>,
    rhs: f64,
    /// `(row index, sign)` mapping the cone dual back to a row multiplier.
    origin: Option<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct ClarabelBackend {
    max_iter: u32,
    tol_gap_abs: f64,
    tol_gap_rel: f64,
}

impl Default for ClarabelBackend {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
        }
    }
}

impl ClarabelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn cone_rows(problem: &QpProblem) -> (Vec<ConeRow>, Vec<ConeRow>) {
        let mut zero = Vec::new();
        let mut nonneg = Vec::new();

        for (r, row) in problem.rows.iter().enumerate() {
            match row.relation {
                Relation::Eq => zero.push(ConeRow {
                    terms: row.terms.clone(),
                    rhs: row.rhs,
                    origin: Some((r, 1.0)),
                }),
                Relation::Le => nonneg.push(ConeRow {
                    terms: row.terms.clone(),
                    rhs: row.rhs,
                    origin: Some((r, 1.0)),
                }),
                Relation::Ge => nonneg.push(ConeRow {
                    terms: row.terms.iter().map(|&(v, c)| (v, -c)).collect(),
                    rhs: -row.rhs,
                    origin: Some((r, -1.0)),
                }),
            }
        }

        for (v, (&lo, &hi)) in problem.lower.iter().zip(&problem.upper).enumerate() {
            if lo.is_finite() && lo == hi {
                zero.push(ConeRow {
                    terms: vec![(v, 1.0)],
                    rhs: lo,
                    origin: None,
                });
                continue;
            }
            if hi.is_finite() {
                nonneg.push(ConeRow {
                    terms: vec![(v, 1.0)],
                    rhs: hi,
                    origin: None,
                });
            }
            if lo.is_finite() {
                nonneg.push(ConeRow {
                    terms: vec![(v, -1.0)],
                    rhs: -lo,
                    origin: None,
                });
            }
        }

        (zero, nonneg)
    }

    /// Column-major CSC of `rows`, summing duplicate entries.
    fn constraint_matrix(rows: &[ConeRow], n_var: usize) -> CscMatrix<f64> {
        let mut columns: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n_var];
        for (r, row) in rows.iter().enumerate() {
            for &(v, c) in &row.terms {
                *columns[v].entry(r).or_insert(0.0) += c;
            }
        }

        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for column in &columns {
            col_ptr.push(row_idx.len());
            for (&r, &c) in column {
                row_idx.push(r);
                values.push(c);
            }
        }
        col_ptr.push(row_idx.len());

        CscMatrix::new(rows.len(), n_var, col_ptr, row_idx, values)
    }

    /// Upper-triangular P such that `(1/2)x'Px = Σ coef·x_i·x_j`.
    fn hessian(problem: &QpProblem) -> CscMatrix<f64> {
        let n_var = problem.num_variables();
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(i, j, coef) in &problem.quadratic {
            if i == j {
                *entries.entry((i, i)).or_insert(0.0) += 2.0 * coef;
            } else {
                let (row, col) = (i.min(j), i.max(j));
                *entries.entry((col, row)).or_insert(0.0) += coef;
            }
        }

        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        let mut iter = entries.into_iter().peekable();
        for col in 0..n_var {
            col_ptr.push(row_idx.len());
            while let Some(&((c, r), v)) = iter.peek() {
                if c != col {
                    break;
                }
                row_idx.push(r);
                values.push(v);
                iter.next();
            }
        }
        col_ptr.push(row_idx.len());

        CscMatrix::new(n_var, n_var, col_ptr, row_idx, values)
    }

    fn map_status(status: SolverStatus) -> SolveStatus {
        match status {
            SolverStatus::Solved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::AlmostSolved
            | SolverStatus::MaxIterations
            | SolverStatus::MaxTime
            | SolverStatus::InsufficientProgress => SolveStatus::Suboptimal,
            _ => SolveStatus::NumericalError,
        }
    }

    /// Problems Clarabel cannot be handed directly: no variables, or no rows
    /// at all (free variables with a linear objective).
    fn solve_trivial(problem: &QpProblem) -> Option<QpSolution> {
        let n_var = problem.num_variables();
        let bounded = problem
            .lower
            .iter()
            .chain(&problem.upper)
            .any(|b| b.is_finite());
        if n_var > 0 && (!problem.rows.is_empty() || bounded || problem.is_quadratic()) {
            return None;
        }
        if problem.linear.iter().any(|&c| c != 0.0) {
            return Some(QpSolution::failed(SolveStatus::Unbounded));
        }
        Some(QpSolution {
            status: SolveStatus::Optimal,
            values: vec![0.0; n_var],
            objective: problem.constant,
            duals: vec![0.0; problem.rows.len()],
            iterations: 0,
            solve_time: Default::default(),
        })
    }
}

impl SolverBackend for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn supports_quadratic(&self) -> bool {
        true
    }

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, BackendError> {
        if let Some(trivial) = Self::solve_trivial(problem) {
            return Ok(trivial);
        }

        let start = Instant::now();
        let n_var = problem.num_variables();
        let (zero, nonneg) = Self::cone_rows(problem);

        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if !zero.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(zero.len()));
        }
        if !nonneg.is_empty() {
            cones.push(SupportedConeT::NonnegativeConeT(nonneg.len()));
        }

        let rows: Vec<ConeRow> = zero.into_iter().chain(nonneg).collect();
        let rhs: Vec<f64> = rows.iter().map(|r| r.rhs).collect();
        let a_mat = Self::constraint_matrix(&rows, n_var);
        let p_mat = Self::hessian(problem);

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(self.max_iter)
            .tol_gap_abs(self.tol_gap_abs)
            .tol_gap_rel(self.tol_gap_rel)
            .build()
            .map_err(|e| BackendError::Setup(format!("Clarabel settings error: {:?}", e)))?;

        let mut solver =
            DefaultSolver::new(&p_mat, &problem.linear, &a_mat, &rhs, &cones, settings).map_err(
                |e| BackendError::Setup(format!("Clarabel initialization failed: {:?}", e)),
            )?;

        solver.solve();

        let sol = solver.solution;
        let status = Self::map_status(sol.status);
        debug!(
            status = %status,
            iterations = sol.iterations,
            vars = n_var,
            rows = rows.len(),
            "clarabel solve finished"
        );

        if !status.has_solution() || sol.x.iter().any(|v| !v.is_finite()) {
            let mut failed = QpSolution::failed(if status.has_solution() {
                SolveStatus::NumericalError
            } else {
                status
            });
            failed.iterations = sol.iterations as usize;
            failed.solve_time = start.elapsed();
            return Ok(failed);
        }

        let mut duals = vec![0.0; problem.rows.len()];
        for (k, row) in rows.iter().enumerate() {
            if let Some((r, sign)) = row.origin {
                duals[r] = sign * sol.z[k];
            }
        }

        Ok(QpSolution {
            status,
            objective: problem.objective_value(&sol.x),
            values: sol.x,
            duals,
            iterations: sol.iterations as usize,
            solve_time: start.elapsed(),
        })
    }
}
