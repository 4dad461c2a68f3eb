//! Backend problems assembled from blocks.
//!
//! A single block becomes a [`QpProblem`] on its own variables. The flattened
//! model concatenates every block (variable offsets in block order), keeps
//! each block's rows and appends the linking constraints as ordinary rows at
//! the end. It backs the Lagrangian heuristic and the relaxation-based
//! multiplier initialization.

use std::ops::Range;

use gdd_core::{Block, ModelGraph, Objective, VarKind};

use crate::backend::QpProblem;

/// Append `block` to `qp` with its variables shifted by the current variable
/// count, using `objective` in place of the block's own. Returns the offset.
pub fn push_block(qp: &mut QpProblem, block: &Block, objective: &Objective) -> usize {
    let offset = qp.num_variables();
    for var in &block.variables {
        let (lo, hi) = var.bounds();
        qp.add_variable(lo, hi, var.kind);
    }
    for con in &block.constraints {
        let terms = con
            .terms
            .iter()
            .map(|t| (offset + t.var, t.coef))
            .collect();
        qp.add_row(terms, con.relation, con.rhs);
    }
    for t in &objective.linear {
        qp.linear[offset + t.var] += t.coef;
    }
    qp.quadratic.extend(
        objective
            .quadratic
            .iter()
            .map(|t| (offset + t.i, offset + t.j, t.coef)),
    );
    qp.constant += objective.constant;
    offset
}

/// One block as a standalone problem.
pub fn block_problem(block: &Block, objective: &Objective) -> QpProblem {
    let mut qp = QpProblem::new();
    push_block(&mut qp, block, objective);
    qp
}

/// All blocks plus the linking rows, in minimization form.
#[derive(Debug, Clone, Default)]
pub struct FlatModel {
    problem: QpProblem,
    offsets: Vec<usize>,
    link_rows: Range<usize>,
}

impl FlatModel {
    /// `objectives[b]` replaces block `b`'s objective (already normalized).
    pub fn build(graph: &ModelGraph, objectives: &[Objective]) -> Self {
        let mut problem = QpProblem::new();
        let offsets = graph
            .blocks
            .iter()
            .zip(objectives)
            .map(|(block, objective)| push_block(&mut problem, block, objective))
            .collect::<Vec<_>>();

        let first_link = problem.rows.len();
        for link in &graph.links {
            let terms = link
                .terms
                .iter()
                .map(|t| (offsets[t.var.block.value()] + t.var.var, t.coef))
                .collect();
            problem.add_row(terms, link.relation, link.rhs);
        }
        let link_rows = first_link..problem.rows.len();

        Self {
            problem,
            offsets,
            link_rows,
        }
    }

    pub fn problem(&self) -> &QpProblem {
        &self.problem
    }

    pub fn link_rows(&self) -> Range<usize> {
        self.link_rows.clone()
    }

    pub fn offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    /// Copy of the model with every variable of the given kinds fixed to its
    /// block value rounded to the nearest integer inside its bounds. Returns
    /// the copy and the number of fixed variables.
    pub fn with_fixed(&self, kinds: &[VarKind], block_values: &[Vec<f64>]) -> (QpProblem, usize) {
        let mut problem = self.problem.clone();
        let mut fixed = 0;
        for (block, values) in block_values.iter().enumerate() {
            let offset = self.offsets[block];
            for (local, &value) in values.iter().enumerate() {
                let k = offset + local;
                if !kinds.contains(&problem.kinds[k]) {
                    continue;
                }
                let rounded = value.round().clamp(problem.lower[k], problem.upper[k]);
                problem.fix(k, rounded);
                fixed += 1;
            }
        }
        (problem, fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdd_core::{Constraint, LinearTerm, LinkTerm, Relation, Variable};

    fn graph() -> ModelGraph {
        let mut graph = ModelGraph::new("flat");
        let a = graph.add_block("a");
        let b = graph.add_block("b");
        let x = graph.add_variable(a, Variable::binary("x"));
        let y = graph.add_variable(b, Variable::continuous("y", 0.0, 5.0));
        let z = graph.add_variable(b, Variable::integer("z", 0.0, 3.0));
        graph.add_constraint(
            b,
            Constraint::new(
                "cap",
                vec![LinearTerm::new(0, 1.0), LinearTerm::new(1, 1.0)],
                Relation::Le,
                6.0,
            ),
        );
        graph.set_objective(a, Objective::linear(vec![LinearTerm::new(0, 2.0)]));
        graph.set_objective(b, Objective::linear(vec![LinearTerm::new(1, 1.0)]));
        graph.link(
            "l",
            vec![
                LinkTerm::new(x, 1.0),
                LinkTerm::new(y, -1.0),
                LinkTerm::new(z, 1.0),
            ],
            Relation::Eq,
            0.0,
        );
        graph
    }

    #[test]
    fn test_offsets_and_link_rows() {
        let g = graph();
        let objectives: Vec<Objective> = g.blocks.iter().map(|b| b.objective.clone()).collect();
        let flat = FlatModel::build(&g, &objectives);
        assert_eq!(flat.offset(0), 0);
        assert_eq!(flat.offset(1), 1);
        assert_eq!(flat.problem().num_variables(), 3);
        assert_eq!(flat.link_rows(), 1..2);

        let link_row = &flat.problem().rows[1];
        assert_eq!(link_row.terms, vec![(0, 1.0), (1, -1.0), (2, 1.0)]);
        // block row shifted by the offset of block b
        assert_eq!(flat.problem().rows[0].terms, vec![(1, 1.0), (2, 1.0)]);
        // block b's objective term is on z, its second variable
        assert_eq!(flat.problem().linear, vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_with_fixed_rounds_selected_kinds() {
        let g = graph();
        let objectives: Vec<Objective> = g.blocks.iter().map(|b| b.objective.clone()).collect();
        let flat = FlatModel::build(&g, &objectives);
        let values = vec![vec![0.7], vec![2.2, 3.6]];

        let (binaries, n) = flat.with_fixed(&[VarKind::Binary], &values);
        assert_eq!(n, 1);
        assert_eq!((binaries.lower[0], binaries.upper[0]), (1.0, 1.0));
        assert_eq!((binaries.lower[2], binaries.upper[2]), (0.0, 3.0));

        let (integers, n) = flat.with_fixed(&[VarKind::Binary, VarKind::Integer], &values);
        assert_eq!(n, 2);
        assert_eq!((integers.lower[2], integers.upper[2]), (3.0, 3.0));
        // continuous variable untouched
        assert_eq!((integers.lower[1], integers.upper[1]), (0.0, 5.0));
    }
}
