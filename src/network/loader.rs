//! Edge lists stored as CSV files with a `v1,v2` header, one undirected edge
//! per row.

use std::path::Path;

use serde::Deserialize;

use crate::error::EpinetError;
use crate::network::graph::Graph;
use crate::population::AgentId;

#[derive(Deserialize, Debug)]
struct EdgeRecord {
    v1: AgentId,
    v2: AgentId,
}

/// Reads an edge list into a graph over `vertex_count` vertices. Repeated
/// rows are kept once; self-loops and ids outside the population are errors.
pub fn load_edge_list(path: impl AsRef<Path>, vertex_count: usize) -> Result<Graph, EpinetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut graph = Graph::new(vertex_count);
    for result in reader.deserialize() {
        let record: EdgeRecord = result?;
        graph.add_edge(record.v1, record.v2)?;
    }
    Ok(graph)
}
