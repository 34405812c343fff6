//! Random graph models.
//!
//! Every generator takes the [`Stream`] it draws from explicitly; nothing here
//! touches global random state, so a layer built from the same seed is always
//! the same graph.

use crate::error::EpinetError;
use crate::network::graph::Graph;
use crate::population::AgentId;
use crate::random::Stream;

const K_REGULAR_MAX_RESTARTS: usize = 200;
const K_REGULAR_MAX_MISSES: usize = 64;

/// Preferential attachment: vertices arrive one at a time and each links to
/// `m` distinct earlier vertices (fewer while fewer exist), chosen with
/// probability proportional to degree plus one.
pub fn barabasi(n: usize, m: usize, stream: &mut Stream) -> Result<Graph, EpinetError> {
    let mut graph = Graph::new(n);
    // Every vertex appears once for its base appeal and once per incident edge
    let mut pool: Vec<AgentId> = Vec::with_capacity(n * (2 * m + 1));
    for vertex in 0..n {
        let wanted = m.min(vertex);
        let mut targets: Vec<AgentId> = Vec::with_capacity(wanted);
        while targets.len() < wanted {
            let index = stream.sample_range(0..pool.len());
            let candidate = pool[index];
            if !targets.contains(&candidate) {
                targets.push(candidate);
            }
        }
        for &target in &targets {
            graph.add_edge(vertex, target)?;
            pool.push(target);
        }
        pool.extend(std::iter::repeat_n(vertex, targets.len() + 1));
    }
    Ok(graph)
}

/// G(n, p): every unordered pair is an edge independently with probability `p`.
pub fn erdos_renyi_gnp(n: usize, p: f64, stream: &mut Stream) -> Result<Graph, EpinetError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(EpinetError::InvalidProbability(p));
    }
    let mut graph = Graph::new(n);
    for source in 0..n {
        for target in (source + 1)..n {
            if stream.sample_bool(p)? {
                graph.add_edge(source, target)?;
            }
        }
    }
    Ok(graph)
}

/// G(n, m): `m` distinct edges chosen uniformly among all pairs.
pub fn erdos_renyi_gnm(n: usize, m: usize, stream: &mut Stream) -> Result<Graph, EpinetError> {
    let max_edges = n * n.saturating_sub(1) / 2;
    if m > max_edges {
        return Err(EpinetError::InvalidParameter(format!(
            "{m} edges requested but a graph of {n} vertices has at most {max_edges}"
        )));
    }
    let mut graph = Graph::new(n);
    while graph.edge_count() < m {
        let source = stream.sample_range(0..n);
        let target = stream.sample_range(0..n);
        if source != target {
            graph.add_edge(source, target)?;
        }
    }
    Ok(graph)
}

/// A uniformly wired graph in which every vertex has degree `k`.
///
/// Stubs are paired at random, rejecting self-loops and repeated edges; when
/// no valid pair is left the wiring restarts.
pub fn k_regular(n: usize, k: usize, stream: &mut Stream) -> Result<Graph, EpinetError> {
    if k > 0 && k >= n {
        return Err(EpinetError::InvalidParameter(format!(
            "degree {k} is impossible with {n} vertices"
        )));
    }
    if (n * k) % 2 != 0 {
        return Err(EpinetError::InvalidParameter(format!(
            "n * k must be even for a {k}-regular graph on {n} vertices"
        )));
    }

    for _ in 0..K_REGULAR_MAX_RESTARTS {
        if let Some(graph) = try_wire_k_regular(n, k, stream)? {
            return Ok(graph);
        }
    }
    Err(EpinetError::InvalidParameter(format!(
        "failed to wire a {k}-regular graph on {n} vertices"
    )))
}

fn try_wire_k_regular(
    n: usize,
    k: usize,
    stream: &mut Stream,
) -> Result<Option<Graph>, EpinetError> {
    let mut graph = Graph::new(n);
    let mut stubs: Vec<AgentId> = (0..n).flat_map(|v| std::iter::repeat_n(v, k)).collect();
    let mut misses = 0;

    while !stubs.is_empty() {
        let i = stream.sample_range(0..stubs.len());
        let j = stream.sample_range(0..stubs.len());
        let (a, b) = (stubs[i], stubs[j]);
        if i != j && a != b && !graph.has_edge(a, b) {
            graph.add_edge(a, b)?;
            // Remove the larger index first so the smaller stays valid
            stubs.swap_remove(i.max(j));
            stubs.swap_remove(i.min(j));
            misses = 0;
            continue;
        }
        misses += 1;
        if misses >= K_REGULAR_MAX_MISSES {
            if !has_valid_pair(&graph, &stubs) {
                return Ok(None);
            }
            misses = 0;
        }
    }
    Ok(Some(graph))
}

fn has_valid_pair(graph: &Graph, stubs: &[AgentId]) -> bool {
    stubs.iter().enumerate().any(|(i, &a)| {
        stubs[i + 1..]
            .iter()
            .any(|&b| a != b && !graph.has_edge(a, b))
    })
}
