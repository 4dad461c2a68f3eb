//! # gdd-core: Block-Structured Model Graphs
//!
//! Provides the data structures for mathematical programs that decompose into
//! independently solvable blocks coupled by linking constraints.
//!
//! ## Design Philosophy
//!
//! A [`ModelGraph`] is a list of [`Block`]s plus a list of [`LinkConstraint`]s:
//! - **Blocks** own their variables, local constraints and objective
//! - **Links** are linear relations whose terms reference variables in
//!   exactly two different blocks (see [`validation`])
//!
//! Variables are addressed by [`VarRef`] (block id + position inside the block),
//! so a block can be handed to a solver on its own without any global index.
//!
//! ## Quick Start
//!
//! ```rust
//! use gdd_core::*;
//!
//! let mut graph = ModelGraph::new("two-blocks");
//!
//! let a = graph.add_block("a");
//! let x1 = graph.add_variable(a, Variable::continuous("x1", 0.0, 10.0));
//! graph.set_objective(a, Objective::linear(vec![LinearTerm::new(x1.var, 1.0)]));
//!
//! let b = graph.add_block("b");
//! let x2 = graph.add_variable(b, Variable::continuous("x2", 0.0, 10.0));
//! graph.set_objective(b, Objective::linear(vec![LinearTerm::new(x2.var, 1.0)]));
//!
//! // x1 = x2
//! graph.link(
//!     "share",
//!     vec![LinkTerm::new(x1, 1.0), LinkTerm::new(x2, -1.0)],
//!     Relation::Eq,
//!     0.0,
//! );
//!
//! assert_eq!(graph.num_links(), 1);
//! assert!(graph.validate().is_ok());
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Issue collection for validation
//! - [`graph_utils`] - Coupling-graph analysis (components, degrees)
//! - [`io`] - JSON persistence
//! - [`validation`] - Structural checks run before decomposition

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod io;
pub mod validation;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{GddError, GddResult};
pub use graph_utils::{coupling_graph, graph_stats, GraphStats};
pub use io::{load_graph, save_graph};

/// Identifier of a block inside a [`ModelGraph`] (its position in `blocks`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockId(usize);

impl BlockId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BlockId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block#{}", self.0)
    }
}

/// Reference to a variable owned by a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarRef {
    pub block: BlockId,
    pub var: usize,
}

impl VarRef {
    pub fn new(block: BlockId, var: usize) -> Self {
        Self { block, var }
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    #[default]
    Continuous,
    Binary,
    Integer,
}

/// A decision variable with (possibly infinite) bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default = "neg_infinity", with = "serde_bound::lower")]
    pub lower: f64,
    #[serde(default = "infinity", with = "serde_bound::upper")]
    pub upper: f64,
    #[serde(default)]
    pub kind: VarKind,
}

fn neg_infinity() -> f64 {
    f64::NEG_INFINITY
}

fn infinity() -> f64 {
    f64::INFINITY
}

/// JSON has no infinities; unbounded sides are written as `null`.
mod serde_bound {
    use serde::{Deserialize, Deserializer, Serializer};

    fn serialize_bound<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub mod lower {
        use super::*;

        pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            serialize_bound(value, serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
        }
    }

    pub mod upper {
        use super::*;

        pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            serialize_bound(value, serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
        }
    }
}

impl Variable {
    pub fn continuous(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            kind: VarKind::Continuous,
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: 0.0,
            upper: 1.0,
            kind: VarKind::Binary,
        }
    }

    pub fn integer(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            kind: VarKind::Integer,
        }
    }

    /// Effective bounds; binaries are clamped to [0, 1].
    pub fn bounds(&self) -> (f64, f64) {
        match self.kind {
            VarKind::Binary => (self.lower.max(0.0), self.upper.min(1.0)),
            _ => (self.lower, self.upper),
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.kind, VarKind::Binary | VarKind::Integer)
    }
}

/// Constraint relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Eq => write!(f, "=="),
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
        }
    }
}

/// `coef * x[var]` with `var` local to the owning block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTerm {
    pub var: usize,
    pub coef: f64,
}

impl LinearTerm {
    pub fn new(var: usize, coef: f64) -> Self {
        Self { var, coef }
    }
}

/// `coef * x[i] * x[j]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadTerm {
    pub i: usize,
    pub j: usize,
    pub coef: f64,
}

impl QuadTerm {
    pub fn new(i: usize, j: usize, coef: f64) -> Self {
        Self { i, j, coef }
    }
}

/// Block-local constraint `Σ coef·x (relation) rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub name: String,
    pub terms: Vec<LinearTerm>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(
        name: impl Into<String>,
        terms: Vec<LinearTerm>,
        relation: Relation,
        rhs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            terms,
            relation,
            rhs,
        }
    }
}

/// Objective `Σ c_k x_k + Σ q_ij x_i x_j + constant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(default)]
    pub linear: Vec<LinearTerm>,
    #[serde(default)]
    pub quadratic: Vec<QuadTerm>,
    #[serde(default)]
    pub constant: f64,
}

impl Objective {
    pub fn linear(terms: Vec<LinearTerm>) -> Self {
        Self {
            linear: terms,
            ..Self::default()
        }
    }

    pub fn with_quadratic(mut self, terms: Vec<QuadTerm>) -> Self {
        self.quadratic = terms;
        self
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    pub fn is_quadratic(&self) -> bool {
        self.quadratic.iter().any(|t| t.coef != 0.0)
    }

    /// Evaluate at a point given by block-local values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let lin: f64 = self
            .linear
            .iter()
            .map(|t| t.coef * values.get(t.var).copied().unwrap_or(0.0))
            .sum();
        let quad: f64 = self
            .quadratic
            .iter()
            .map(|t| {
                t.coef
                    * values.get(t.i).copied().unwrap_or(0.0)
                    * values.get(t.j).copied().unwrap_or(0.0)
            })
            .sum();
        self.constant + lin + quad
    }

    /// Same objective multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            linear: self
                .linear
                .iter()
                .map(|t| LinearTerm::new(t.var, factor * t.coef))
                .collect(),
            quadratic: self
                .quadratic
                .iter()
                .map(|t| QuadTerm::new(t.i, t.j, factor * t.coef))
                .collect(),
            constant: factor * self.constant,
        }
    }
}

/// Optimization direction of the whole graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

impl ObjectiveSense {
    /// Normalization factor turning the graph into a minimization problem.
    pub fn sign(&self) -> f64 {
        match self {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        }
    }
}

/// An independently solvable sub-model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: BlockId,
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub objective: Objective,
}

impl Block {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn has_integral(&self) -> bool {
        self.variables.iter().any(Variable::is_integral)
    }
}

/// `coef * x[var]` where `var` may live in any block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkTerm {
    pub var: VarRef,
    pub coef: f64,
}

impl LinkTerm {
    pub fn new(var: VarRef, coef: f64) -> Self {
        Self { var, coef }
    }
}

/// Linear relation spanning variables owned by different blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConstraint {
    #[serde(default)]
    pub name: String,
    pub terms: Vec<LinkTerm>,
    pub relation: Relation,
    #[serde(default)]
    pub rhs: f64,
}

impl LinkConstraint {
    /// Distinct blocks touched by this link, in order of first appearance.
    pub fn blocks(&self) -> Vec<BlockId> {
        let mut seen = Vec::new();
        for term in &self.terms {
            if !seen.contains(&term.var.block) {
                seen.push(term.var.block);
            }
        }
        seen
    }
}

/// Blocks plus the linking constraints that couple them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelGraph {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sense: ObjectiveSense,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub links: Vec<LinkConstraint>,
}

impl ModelGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_sense(mut self, sense: ObjectiveSense) -> Self {
        self.sense = sense;
        self
    }

    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Block {
            id,
            name: name.into(),
            ..Block::default()
        });
        id
    }

    /// Append a variable to `block`.
    ///
    /// # Panics
    /// If `block` was not created by this graph.
    pub fn add_variable(&mut self, block: BlockId, variable: Variable) -> VarRef {
        let b = &mut self.blocks[block.value()];
        b.variables.push(variable);
        VarRef::new(block, b.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, block: BlockId, constraint: Constraint) {
        self.blocks[block.value()].constraints.push(constraint);
    }

    pub fn set_objective(&mut self, block: BlockId, objective: Objective) {
        self.blocks[block.value()].objective = objective;
    }

    /// Add a linking constraint and return its position.
    pub fn link(
        &mut self,
        name: impl Into<String>,
        terms: Vec<LinkTerm>,
        relation: Relation,
        rhs: f64,
    ) -> usize {
        self.links.push(LinkConstraint {
            name: name.into(),
            terms,
            relation,
            rhs,
        });
        self.links.len() - 1
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.value())
    }

    pub fn variable(&self, var: VarRef) -> Option<&Variable> {
        self.block(var.block)?.variables.get(var.var)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_variables(&self) -> usize {
        self.blocks.iter().map(Block::num_variables).sum()
    }

    /// Run the structural checks of [`validation::validate_graph`] and fail on
    /// the first error.
    pub fn validate(&self) -> GddResult<Diagnostics> {
        let diagnostics = validation::validate_graph(self);
        if diagnostics.has_errors() {
            let first = diagnostics
                .errors()
                .next()
                .map(ToString::to_string)
                .unwrap_or_default();
            return Err(GddError::Validation(first));
        }
        Ok(diagnostics)
    }
}
