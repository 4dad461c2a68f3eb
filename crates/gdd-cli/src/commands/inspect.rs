//! Structure summary of a model graph.

use std::path::Path;

use anyhow::{Context, Result};
use gdd_core::{graph_stats, graph_utils::block_components, load_graph, ModelGraph};
use serde::Serialize;

#[derive(Serialize)]
struct BlockSummary {
    name: String,
    variables: usize,
    constraints: usize,
    integral: usize,
    links: usize,
}

fn block_summaries(graph: &ModelGraph) -> Vec<BlockSummary> {
    graph
        .blocks
        .iter()
        .map(|block| BlockSummary {
            name: block.name.clone(),
            variables: block.num_variables(),
            constraints: block.constraints.len(),
            integral: block.variables.iter().filter(|v| v.is_integral()).count(),
            links: graph
                .links
                .iter()
                .filter(|l| l.blocks().contains(&block.id))
                .count(),
        })
        .collect()
}

pub fn handle(path: &Path, json: bool) -> Result<()> {
    let graph = load_graph(path).with_context(|| format!("loading {}", path.display()))?;
    let stats = graph_stats(&graph);
    let blocks = block_summaries(&graph);

    if json {
        let out = serde_json::json!({
            "name": graph.name,
            "sense": graph.sense,
            "stats": stats,
            "blocks": blocks,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Model graph: {}", graph.name);
    println!("  Sense:                {:?}", graph.sense);
    println!("  Blocks:               {}", stats.blocks);
    println!("  Links:                {}", stats.links);
    println!("  Variables:            {}", stats.variables);
    println!("  Integral variables:   {}", stats.integral_variables);
    println!("  Block constraints:    {}", stats.constraints);
    println!("  Components:           {}", stats.connected_components);
    println!(
        "  Block degree:         max {} / avg {:.2}",
        stats.max_block_degree, stats.avg_block_degree
    );

    println!();
    println!(
        "{:<20} {:>9} {:>11} {:>9} {:>6}",
        "block", "variables", "constraints", "integral", "links"
    );
    for b in &blocks {
        println!(
            "{:<20} {:>9} {:>11} {:>9} {:>6}",
            b.name, b.variables, b.constraints, b.integral, b.links
        );
    }

    let components = block_components(&graph);
    if components.len() > 1 {
        println!();
        println!("Independent groups:");
        for (i, group) in components.iter().enumerate() {
            let names: Vec<&str> = group
                .iter()
                .filter_map(|id| graph.block(*id).map(|b| b.name.as_str()))
                .collect();
            println!("  {}: {}", i + 1, names.join(", "));
        }
    }
    Ok(())
}
