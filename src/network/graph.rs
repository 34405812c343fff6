/*!

An undirected simple graph over a fixed vertex set `0..n`.

Edges are stored once, endpoints normalized so the smaller id comes first, and every edge gets a
dense `EdgeId` in insertion order. Each vertex keeps an adjacency list of `(neighbor, edge)` pairs,
so neighborhood and incident-edge queries never scan the edge list.

*/

use crate::error::EpinetError;
use crate::population::AgentId;

/// Index of an edge in its graph's edge list.
pub type EdgeId = usize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    vertex_count: usize,
    edges: Vec<(AgentId, AgentId)>,
    adjacency: Vec<Vec<(AgentId, EdgeId)>>,
}

impl Graph {
    /// A graph with `vertex_count` vertices and no edges.
    #[must_use]
    pub fn new(vertex_count: usize) -> Graph {
        Graph {
            vertex_count,
            edges: Vec::new(),
            adjacency: vec![Vec::new(); vertex_count],
        }
    }

    /// Builds a graph from endpoint pairs. Duplicate pairs (in either
    /// orientation) are kept once.
    pub fn from_edges(
        vertex_count: usize,
        edges: impl IntoIterator<Item = (AgentId, AgentId)>,
    ) -> Result<Graph, EpinetError> {
        let mut graph = Graph::new(vertex_count);
        for (source, target) in edges {
            graph.add_edge(source, target)?;
        }
        Ok(graph)
    }

    /// Adds the undirected edge `{source, target}`.
    ///
    /// Returns the new edge's id, or `None` if the edge already exists.
    /// Self-loops and out-of-range endpoints are rejected.
    pub fn add_edge(
        &mut self,
        source: AgentId,
        target: AgentId,
    ) -> Result<Option<EdgeId>, EpinetError> {
        if source == target || source >= self.vertex_count || target >= self.vertex_count {
            return Err(EpinetError::InvalidEdge { source, target });
        }
        if self.has_edge(source, target) {
            return Ok(None);
        }
        let id = self.edges.len();
        self.edges.push((source.min(target), source.max(target)));
        self.adjacency[source].push((target, id));
        self.adjacency[target].push((source, id));
        Ok(Some(id))
    }

    #[must_use]
    pub fn has_edge(&self, a: AgentId, b: AgentId) -> bool {
        let (Some(list_a), Some(list_b)) = (self.adjacency.get(a), self.adjacency.get(b)) else {
            return false;
        };
        // Scan the shorter list
        let (list, other) = if list_a.len() <= list_b.len() {
            (list_a, b)
        } else {
            (list_b, a)
        };
        list.iter().any(|(neighbor, _)| *neighbor == other)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges in id order, as `(smaller, larger)` endpoint pairs.
    #[must_use]
    pub fn edges(&self) -> &[(AgentId, AgentId)] {
        &self.edges
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<(AgentId, AgentId)> {
        self.edges.get(id).copied()
    }

    /// `(neighbor, edge)` pairs of `vertex`; empty for an unknown vertex.
    #[must_use]
    pub fn incident(&self, vertex: AgentId) -> &[(AgentId, EdgeId)] {
        self.adjacency.get(vertex).map_or(&[], Vec::as_slice)
    }

    pub fn neighbors(&self, vertex: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        self.incident(vertex).iter().map(|(neighbor, _)| *neighbor)
    }

    #[must_use]
    pub fn degree(&self, vertex: AgentId) -> usize {
        self.incident(vertex).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_undirected_and_unique() {
        let mut graph = Graph::new(4);
        assert_eq!(graph.add_edge(2, 0).unwrap(), Some(0));
        assert_eq!(graph.add_edge(0, 2).unwrap(), None);
        assert_eq!(graph.add_edge(1, 2).unwrap(), Some(1));

        assert_eq!(graph.edges(), &[(0, 2), (1, 2)]);
        assert!(graph.has_edge(2, 0));
        assert!(!graph.has_edge(0, 1));
        assert_eq!(graph.neighbors(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(graph.degree(3), 0);
    }

    #[test]
    fn rejects_self_loops_and_unknown_vertices() {
        let mut graph = Graph::new(3);
        assert!(matches!(
            graph.add_edge(1, 1),
            Err(EpinetError::InvalidEdge {
                source: 1,
                target: 1
            })
        ));
        assert!(graph.add_edge(0, 3).is_err());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn from_edges_skips_duplicates() {
        let graph = Graph::from_edges(3, [(0, 1), (1, 0), (1, 2)]).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.incident(1), &[(0, 0), (2, 1)]);
        assert!(graph.incident(7).is_empty());
    }
}
