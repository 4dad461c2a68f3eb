//! Structural checks run before a graph is decomposed.
//!
//! The decomposition keeps a two-column value matrix per link, so every link
//! must touch exactly two blocks. Everything else reported here is either a
//! dangling reference or a value no solver can digest.

use crate::diagnostics::Diagnostics;
use crate::graph_utils::coupling_graph;
use crate::ModelGraph;

/// Collect every structural issue of `graph`.
pub fn validate_graph(graph: &ModelGraph) -> Diagnostics {
    let mut diag = Diagnostics::new();

    for block in &graph.blocks {
        let entity = format!("block {}", block.name);
        if block.variables.is_empty() {
            diag.add_warning_with_entity("structure", "Block has no variables", &entity);
        }
        for var in &block.variables {
            let (lower, upper) = var.bounds();
            if lower > upper {
                diag.add_error_with_entity(
                    "numeric",
                    &format!(
                        "Variable {} has lower bound {} above upper bound {}",
                        var.name, lower, upper
                    ),
                    &entity,
                );
            }
        }
        for con in &block.constraints {
            for term in &con.terms {
                if term.var >= block.variables.len() {
                    diag.add_error_with_entity(
                        "reference",
                        &format!(
                            "Constraint {} references variable {} of {}",
                            con.name,
                            term.var,
                            block.variables.len()
                        ),
                        &entity,
                    );
                }
                if !term.coef.is_finite() {
                    diag.add_error_with_entity(
                        "numeric",
                        &format!("Constraint {} has a non-finite coefficient", con.name),
                        &entity,
                    );
                }
            }
            if !con.rhs.is_finite() {
                diag.add_error_with_entity(
                    "numeric",
                    &format!("Constraint {} has a non-finite right-hand side", con.name),
                    &entity,
                );
            }
        }
        let n = block.variables.len();
        let objective_ok = block.objective.linear.iter().all(|t| t.var < n)
            && block.objective.quadratic.iter().all(|t| t.i < n && t.j < n);
        if !objective_ok {
            diag.add_error_with_entity(
                "reference",
                "Objective references a variable outside the block",
                &entity,
            );
        }
    }

    for (idx, link) in graph.links.iter().enumerate() {
        let entity = if link.name.is_empty() {
            format!("link #{idx}")
        } else {
            format!("link {}", link.name)
        };
        let mut dangling = false;
        for term in &link.terms {
            if graph.variable(term.var).is_none() {
                dangling = true;
                diag.add_error_with_entity(
                    "reference",
                    &format!(
                        "Term references variable {} of {}, which does not exist",
                        term.var.var, term.var.block
                    ),
                    &entity,
                );
            }
            if !term.coef.is_finite() {
                diag.add_error_with_entity("numeric", "Non-finite link coefficient", &entity);
            }
        }
        if dangling {
            continue;
        }
        match link.blocks().len() {
            2 => {}
            0 | 1 => diag.add_error_with_entity(
                "structure",
                "Link must couple two different blocks",
                &entity,
            ),
            n => diag.add_error_with_entity(
                "structure",
                &format!("Link couples {n} blocks; only pairwise links can be dualized"),
                &entity,
            ),
        }
        if !link.rhs.is_finite() {
            diag.add_error_with_entity("numeric", "Non-finite link right-hand side", &entity);
        }
    }

    if graph.num_blocks() > 1 {
        let coupling = coupling_graph(graph);
        for node in coupling.node_indices() {
            if coupling.edges(node).next().is_none() {
                let id = coupling[node];
                let name = graph.block(id).map(|b| b.name.as_str()).unwrap_or("?");
                diag.add_warning_with_entity(
                    "structure",
                    "Block is not coupled to any other block",
                    &format!("block {name}"),
                );
            }
        }
    }

    diag
}
