use std::path::Path;

use anyhow::{bail, Context, Result};
use gdd_core::{load_graph, validation::validate_graph};
use tracing::info;

pub fn handle(path: &Path) -> Result<()> {
    let graph = load_graph(path).with_context(|| format!("loading {}", path.display()))?;
    let diagnostics = validate_graph(&graph);

    for issue in diagnostics.errors().chain(diagnostics.warnings()) {
        println!("{issue}");
    }
    println!("{}", diagnostics.summary());

    if diagnostics.has_errors() {
        bail!(
            "{} has {} structural error(s)",
            path.display(),
            diagnostics.error_count()
        );
    }
    info!(graph = %graph.name, "model graph is valid");
    Ok(())
}
