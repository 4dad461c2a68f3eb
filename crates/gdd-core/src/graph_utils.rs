use crate::{BlockId, ModelGraph};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Dfs;
use serde::Serialize;

/// Summary statistics produced by `gdd inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub blocks: usize,
    pub links: usize,
    pub variables: usize,
    pub constraints: usize,
    pub integral_variables: usize,
    pub connected_components: usize,
    pub max_block_degree: usize,
    pub avg_block_degree: f64,
}

/// Block coupling graph: one node per block (weight = its id), one edge per
/// link and pair of distinct blocks it touches (weight = link position).
pub fn coupling_graph(graph: &ModelGraph) -> UnGraph<BlockId, usize> {
    let mut coupling = UnGraph::with_capacity(graph.num_blocks(), graph.num_links());
    let nodes: Vec<NodeIndex> = graph
        .blocks
        .iter()
        .map(|block| coupling.add_node(block.id))
        .collect();

    for (idx, link) in graph.links.iter().enumerate() {
        let blocks = link.blocks();
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                if let (Some(&na), Some(&nb)) = (nodes.get(a.value()), nodes.get(b.value())) {
                    coupling.add_edge(na, nb, idx);
                }
            }
        }
    }
    coupling
}

/// Calculates block/link counts, degree distribution and component count.
pub fn graph_stats(graph: &ModelGraph) -> GraphStats {
    let coupling = coupling_graph(graph);
    let degrees: Vec<usize> = coupling
        .node_indices()
        .map(|n| coupling.edges(n).count())
        .collect();
    let max_block_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_block_degree = if degrees.is_empty() {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
    };

    GraphStats {
        blocks: graph.num_blocks(),
        links: graph.num_links(),
        variables: graph.num_variables(),
        constraints: graph.blocks.iter().map(|b| b.constraints.len()).sum(),
        integral_variables: graph
            .blocks
            .iter()
            .flat_map(|b| b.variables.iter())
            .filter(|v| v.is_integral())
            .count(),
        connected_components: connected_components(&coupling),
        max_block_degree,
        avg_block_degree,
    }
}

/// Groups of blocks that are (transitively) coupled, each sorted by id.
pub fn block_components(graph: &ModelGraph) -> Vec<Vec<BlockId>> {
    let coupling = coupling_graph(graph);
    let mut visited = vec![false; coupling.node_count()];
    let mut components = Vec::new();

    for start in coupling.node_indices() {
        if visited[start.index()] {
            continue;
        }
        let mut members = Vec::new();
        let mut dfs = Dfs::new(&coupling, start);
        while let Some(node) = dfs.next(&coupling) {
            visited[node.index()] = true;
            members.push(coupling[node]);
        }
        members.sort();
        components.push(members);
    }
    components
}
