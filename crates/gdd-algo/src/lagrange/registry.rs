//! Link registry: which block sits on which side of each dualized link.
//!
//! Link `i` owns multiplier `λ_i` and one row of the value matrix `x`. The
//! first block encountered in the link's terms takes slot 0, the other block
//! slot 1, and the residual is
//!
//! ```text
//!   x[i][0] = Σ_{slot 0 terms} coef·v
//!   x[i][1] = rhs − Σ_{slot 1 terms} coef·v
//!   res[i]  = x[i][0] − x[i][1]
//! ```
//!
//! which equals `Σ coef·v − rhs` over the whole link.

use gdd_core::{BlockId, ModelGraph, Relation};

use crate::error::LagrangeError;

/// Feasible set of a multiplier in minimization form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierDomain {
    Free,
    NonNegative,
    NonPositive,
}

impl MultiplierDomain {
    pub fn for_relation(relation: Relation) -> Self {
        match relation {
            Relation::Eq => MultiplierDomain::Free,
            Relation::Le => MultiplierDomain::NonNegative,
            Relation::Ge => MultiplierDomain::NonPositive,
        }
    }

    pub fn project(&self, value: f64) -> f64 {
        match self {
            MultiplierDomain::Free => value,
            MultiplierDomain::NonNegative => value.max(0.0),
            MultiplierDomain::NonPositive => value.min(0.0),
        }
    }

    /// Intersect `[lo, hi]` with the domain.
    pub fn clamp_interval(&self, lo: f64, hi: f64) -> (f64, f64) {
        match self {
            MultiplierDomain::Free => (lo, hi),
            MultiplierDomain::NonNegative => (lo.max(0.0), hi.max(0.0)),
            MultiplierDomain::NonPositive => (lo.min(0.0), hi.min(0.0)),
        }
    }

    /// Part of a residual that counts as a violation.
    pub fn violation(&self, residual: f64) -> f64 {
        match self {
            MultiplierDomain::Free => residual,
            MultiplierDomain::NonNegative => residual.max(0.0),
            MultiplierDomain::NonPositive => residual.min(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkEntry {
    pub name: String,
    pub relation: Relation,
    pub rhs: f64,
    /// Blocks in slot order.
    pub blocks: [BlockId; 2],
    pub domain: MultiplierDomain,
}

/// One block's share of one link.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLink {
    pub link: usize,
    pub slot: usize,
    /// `(local var, coef)`
    pub terms: Vec<(usize, f64)>,
}

impl BlockLink {
    pub fn side_value(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v]).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRegistry {
    links: Vec<LinkEntry>,
    per_block: Vec<Vec<BlockLink>>,
}

impl LinkRegistry {
    /// Register every link of `graph`. The graph must already be validated.
    pub fn build(graph: &ModelGraph) -> Result<Self, LagrangeError> {
        let mut per_block: Vec<Vec<BlockLink>> = vec![Vec::new(); graph.num_blocks()];
        let mut links = Vec::with_capacity(graph.num_links());

        for (i, link) in graph.links.iter().enumerate() {
            let blocks = link.blocks();
            let [first, second] = blocks[..] else {
                return Err(LagrangeError::InvalidConfig(format!(
                    "link '{}' touches {} blocks; exactly 2 are required",
                    link.name,
                    blocks.len()
                )));
            };

            for (slot, block) in [first, second].into_iter().enumerate() {
                let terms = link
                    .terms
                    .iter()
                    .filter(|t| t.var.block == block)
                    .map(|t| (t.var.var, t.coef))
                    .collect();
                per_block[block.value()].push(BlockLink {
                    link: i,
                    slot,
                    terms,
                });
            }

            links.push(LinkEntry {
                name: link.name.clone(),
                relation: link.relation,
                rhs: link.rhs,
                blocks: [first, second],
                domain: MultiplierDomain::for_relation(link.relation),
            });
        }

        Ok(Self { links, per_block })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> &[LinkEntry] {
        &self.links
    }

    pub fn link(&self, index: usize) -> &LinkEntry {
        &self.links[index]
    }

    /// Links `block` participates in.
    pub fn block_links(&self, block: usize) -> &[BlockLink] {
        &self.per_block[block]
    }

    pub fn rhs(&self) -> Vec<f64> {
        self.links.iter().map(|l| l.rhs).collect()
    }

    pub fn domains(&self) -> Vec<MultiplierDomain> {
        self.links.iter().map(|l| l.domain).collect()
    }

    /// Project every multiplier onto its domain.
    pub fn project(&self, lambda: &mut [f64]) {
        for (value, link) in lambda.iter_mut().zip(&self.links) {
            *value = link.domain.project(*value);
        }
    }

    /// Value written into `x[link][slot]` for a side whose terms sum to `side`.
    pub fn slot_value(&self, link: usize, slot: usize, side: f64) -> f64 {
        if slot == 0 {
            side
        } else {
            self.links[link].rhs - side
        }
    }

    /// Value the side in `slot` must take for the link to hold, given the
    /// other side's entry in `x`.
    pub fn consensus_target(&self, link: usize, slot: usize, x: &[[f64; 2]]) -> f64 {
        if slot == 0 {
            x[link][1]
        } else {
            self.links[link].rhs - x[link][0]
        }
    }

    pub fn residual(&self, x: &[[f64; 2]]) -> Vec<f64> {
        x.iter().map(|row| row[0] - row[1]).collect()
    }

    /// Euclidean norm of the violated part of `res`.
    pub fn violation_norm(&self, res: &[f64]) -> f64 {
        res.iter()
            .zip(&self.links)
            .map(|(r, l)| l.domain.violation(*r).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdd_core::{LinkTerm, Variable};

    fn two_block_graph(relation: Relation) -> ModelGraph {
        let mut graph = ModelGraph::new("pair");
        let a = graph.add_block("a");
        let b = graph.add_block("b");
        let xa = graph.add_variable(a, Variable::continuous("xa", 0.0, 10.0));
        let ya = graph.add_variable(a, Variable::continuous("ya", 0.0, 10.0));
        let xb = graph.add_variable(b, Variable::continuous("xb", 0.0, 10.0));
        graph.link(
            "share",
            vec![
                LinkTerm::new(xb, 2.0),
                LinkTerm::new(xa, 1.0),
                LinkTerm::new(ya, -1.0),
            ],
            relation,
            4.0,
        );
        graph
    }

    #[test]
    fn test_first_encountered_block_takes_slot_zero() {
        let registry = LinkRegistry::build(&two_block_graph(Relation::Eq)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.link(0).blocks, [BlockId::new(1), BlockId::new(0)]);

        let b_links = registry.block_links(1);
        assert_eq!(b_links[0].slot, 0);
        assert_eq!(b_links[0].terms, vec![(0, 2.0)]);

        let a_links = registry.block_links(0);
        assert_eq!(a_links[0].slot, 1);
        assert_eq!(a_links[0].terms, vec![(0, 1.0), (1, -1.0)]);
    }

    #[test]
    fn test_residual_matches_link_violation() {
        let registry = LinkRegistry::build(&two_block_graph(Relation::Eq)).unwrap();
        // xb = 3, xa = 5, ya = 1  →  2·3 + 5 − 1 − 4 = 6
        let side0 = registry.block_links(1)[0].side_value(&[3.0]);
        let side1 = registry.block_links(0)[0].side_value(&[5.0, 1.0]);
        let x = vec![[
            registry.slot_value(0, 0, side0),
            registry.slot_value(0, 1, side1),
        ]];
        assert_eq!(registry.residual(&x), vec![6.0]);
    }

    #[test]
    fn test_domains_follow_relation() {
        let le = LinkRegistry::build(&two_block_graph(Relation::Le)).unwrap();
        let ge = LinkRegistry::build(&two_block_graph(Relation::Ge)).unwrap();
        assert_eq!(le.link(0).domain, MultiplierDomain::NonNegative);
        assert_eq!(ge.link(0).domain, MultiplierDomain::NonPositive);

        let mut lambda = vec![-3.0];
        le.project(&mut lambda);
        assert_eq!(lambda, vec![0.0]);

        // satisfied inequality does not count toward the norm
        assert_eq!(le.violation_norm(&[-2.0]), 0.0);
        assert_eq!(ge.violation_norm(&[-2.0]), 2.0);
    }

    #[test]
    fn test_consensus_target() {
        let registry = LinkRegistry::build(&two_block_graph(Relation::Eq)).unwrap();
        let x = vec![[6.0, 1.0]];
        assert_eq!(registry.consensus_target(0, 0, &x), 1.0);
        assert_eq!(registry.consensus_target(0, 1, &x), 4.0 - 6.0);
    }
}
