//! JSON persistence for [`ModelGraph`].

use crate::{GddError, GddResult, ModelGraph};
use std::fs;
use std::path::Path;

/// Read a model graph from a JSON file.
///
/// Block ids are reassigned from their position so hand-written files do not
/// have to keep `id` and order in sync.
pub fn load_graph(path: impl AsRef<Path>) -> GddResult<ModelGraph> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut graph: ModelGraph = serde_json::from_str(&text)
        .map_err(|e| GddError::Parse(format!("{}: {}", path.display(), e)))?;
    for (idx, block) in graph.blocks.iter_mut().enumerate() {
        block.id = crate::BlockId::new(idx);
    }
    Ok(graph)
}

/// Write a model graph as pretty-printed JSON.
pub fn save_graph(graph: &ModelGraph, path: impl AsRef<Path>) -> GddResult<()> {
    let json = serde_json::to_string_pretty(graph)?;
    fs::write(path, json)?;
    Ok(())
}
