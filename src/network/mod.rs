//! Multi-layer contact networks.
//!
//! A [`Network`] is a set of named [`Layer`]s over the same agents. Each
//! layer wraps one undirected [`Graph`] whose vertex ids are agent ids, can be
//! switched off and on without losing its edges, and stores any number of
//! per-edge `f64` attributes (one per disease for transmission probabilities).
//!
//! Aggregate queries (neighborhoods with no layer named, and everything the
//! population computes from them) only look at *active* layers.

pub mod generators;
mod graph;
mod loader;

use std::path::PathBuf;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

pub use graph::{EdgeId, Graph};
pub use loader::load_edge_list;

use crate::error::EpinetError;
use crate::population::AgentId;
use crate::random::Stream;

/// How a layer's graph is obtained.
///
/// Generated variants carry the seed of the stream the generator draws from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LayerSource {
    #[serde(skip)]
    Graph(Graph),
    Barabasi { m: usize, seed: u64 },
    ErdosRenyi { p: f64, seed: u64 },
    ErdosRenyiEdges { m: usize, seed: u64 },
    KRegular { k: usize, seed: u64 },
    EdgeListFile { path: PathBuf },
}

impl LayerSource {
    /// Produces a graph over `vertex_count` vertices.
    pub fn build(self, label: &str, vertex_count: usize) -> Result<Graph, EpinetError> {
        let stream_label = format!("layer:{label}");
        let graph = match self {
            LayerSource::Graph(graph) => graph,
            LayerSource::Barabasi { m, seed } => {
                generators::barabasi(vertex_count, m, &mut Stream::new(&stream_label, seed))?
            }
            LayerSource::ErdosRenyi { p, seed } => generators::erdos_renyi_gnp(
                vertex_count,
                p,
                &mut Stream::new(&stream_label, seed),
            )?,
            LayerSource::ErdosRenyiEdges { m, seed } => generators::erdos_renyi_gnm(
                vertex_count,
                m,
                &mut Stream::new(&stream_label, seed),
            )?,
            LayerSource::KRegular { k, seed } => {
                generators::k_regular(vertex_count, k, &mut Stream::new(&stream_label, seed))?
            }
            LayerSource::EdgeListFile { path } => load_edge_list(path, vertex_count)?,
        };
        if graph.vertex_count() != vertex_count {
            return Err(EpinetError::SizeMismatch {
                what: format!("graph of layer '{label}'"),
                expected: vertex_count,
                actual: graph.vertex_count(),
            });
        }
        Ok(graph)
    }
}

/// Values written to an edge attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeValues {
    /// One value for every written edge.
    Uniform(f64),
    /// One value per written edge, in the same order as the edges.
    PerEdge(Vec<f64>),
}

/// Edges selected from a layer: ids for attribute write-back and the
/// endpoint pairs in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeSelection {
    pub ids: Vec<EdgeId>,
    pub pairs: Vec<(AgentId, AgentId)>,
}

impl EdgeSelection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    label: String,
    graph: Graph,
    active: bool,
    attributes: IndexMap<String, Vec<f64>>,
}

impl Layer {
    /// A new, active layer without edge attributes.
    #[must_use]
    pub fn new(label: &str, graph: Graph) -> Layer {
        Layer {
            label: label.to_string(),
            graph,
            active: true,
            attributes: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The whole column of an edge attribute, indexed by `EdgeId`.
    #[must_use]
    pub fn edge_attribute(&self, attribute: &str) -> Option<&[f64]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }

    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    fn set_attribute(
        &mut self,
        attribute: &str,
        values: EdgeValues,
        edges: Option<&[EdgeId]>,
    ) -> Result<(), EpinetError> {
        let edge_count = self.graph.edge_count();
        if let Some(&bad) = edges.and_then(|ids| ids.iter().find(|&&id| id >= edge_count)) {
            return Err(EpinetError::InvalidParameter(format!(
                "edge {bad} doesn't exist in layer '{}' ({edge_count} edges)",
                self.label
            )));
        }
        let written = edges.map_or(edge_count, <[EdgeId]>::len);
        if let EdgeValues::PerEdge(values) = &values {
            if values.len() != written {
                return Err(EpinetError::SizeMismatch {
                    what: format!("values for edge attribute '{attribute}'"),
                    expected: written,
                    actual: values.len(),
                });
            }
        }

        let column = self
            .attributes
            .entry(attribute.to_string())
            .or_insert_with(|| vec![0.0; edge_count]);
        match (edges, values) {
            (None, EdgeValues::Uniform(value)) => column.fill(value),
            (None, EdgeValues::PerEdge(values)) => *column = values,
            (Some(ids), EdgeValues::Uniform(value)) => {
                for &id in ids {
                    column[id] = value;
                }
            }
            (Some(ids), EdgeValues::PerEdge(values)) => {
                for (&id, value) in ids.iter().zip(values) {
                    column[id] = value;
                }
            }
        }
        Ok(())
    }
}

/// The named layers of a population's contact structure.
#[derive(Debug, Clone, Default)]
pub struct Network {
    size: usize,
    layers: IndexMap<String, Layer>,
}

impl Network {
    /// An empty network over `size` agents.
    #[must_use]
    pub fn new(size: usize) -> Network {
        Network {
            size,
            layers: IndexMap::new(),
        }
    }

    /// Number of vertices of every layer.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Adds an active layer. Layers are added through the population so
    /// introduced diseases get their edge attributes.
    pub(crate) fn add_layer(&mut self, label: &str, graph: Graph) -> Result<(), EpinetError> {
        if self.layers.contains_key(label) {
            return Err(EpinetError::DuplicateLayer(label.to_string()));
        }
        if graph.vertex_count() != self.size {
            return Err(EpinetError::SizeMismatch {
                what: format!("graph of layer '{label}'"),
                expected: self.size,
                actual: graph.vertex_count(),
            });
        }
        debug!("adding layer '{label}' ({} edges)", graph.edge_count());
        self.layers.insert(label.to_string(), Layer::new(label, graph));
        Ok(())
    }

    pub fn layer(&self, label: &str) -> Result<&Layer, EpinetError> {
        self.layers
            .get(label)
            .ok_or_else(|| EpinetError::UnknownLayer(label.to_string()))
    }

    fn layer_mut(&mut self, label: &str) -> Result<&mut Layer, EpinetError> {
        self.layers
            .get_mut(label)
            .ok_or_else(|| EpinetError::UnknownLayer(label.to_string()))
    }

    /// Layer labels in the order the layers were added.
    pub fn layer_labels(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn active_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values().filter(|layer| layer.active)
    }

    pub fn is_active(&self, label: &str) -> Result<bool, EpinetError> {
        Ok(self.layer(label)?.active)
    }

    pub fn activate_layer(&mut self, label: &str) -> Result<(), EpinetError> {
        debug!("activating layer '{label}'");
        self.layer_mut(label)?.active = true;
        Ok(())
    }

    /// Removes the layer from aggregate queries. Its graph and edge
    /// attributes are kept as they are.
    pub fn deactivate_layer(&mut self, label: &str) -> Result<(), EpinetError> {
        debug!("deactivating layer '{label}'");
        self.layer_mut(label)?.active = false;
        Ok(())
    }

    /// Neighbors of each queried agent, sorted and deduplicated.
    ///
    /// With a layer label only that layer is consulted, whether or not it is
    /// active. Without one, the result is the union over all active layers.
    pub fn get_neighborhood(
        &self,
        ids: &[AgentId],
        layer: Option<&str>,
    ) -> Result<Vec<Vec<AgentId>>, EpinetError> {
        self.check_agents(ids)?;
        let layers: Vec<&Layer> = match layer {
            Some(label) => vec![self.layer(label)?],
            None => self.active_layers().collect(),
        };
        Ok(ids
            .iter()
            .map(|&id| {
                let mut neighbors: Vec<AgentId> = layers
                    .iter()
                    .flat_map(|layer| layer.graph.neighbors(id))
                    .collect();
                neighbors.sort_unstable();
                neighbors.dedup();
                neighbors
            })
            .collect())
    }

    /// Edges of a layer, all of them or only those incident to `targets`.
    /// Each edge appears once, in edge id order.
    pub fn get_edges(
        &self,
        layer: &str,
        targets: Option<&[AgentId]>,
    ) -> Result<EdgeSelection, EpinetError> {
        let graph = &self.layer(layer)?.graph;
        let ids: Vec<EdgeId> = match targets {
            None => (0..graph.edge_count()).collect(),
            Some(targets) => {
                self.check_agents(targets)?;
                let mut ids: Vec<EdgeId> = targets
                    .iter()
                    .flat_map(|&agent| graph.incident(agent).iter().map(|(_, edge)| *edge))
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        };
        let pairs = graph.edges();
        Ok(EdgeSelection {
            pairs: ids.iter().map(|&id| pairs[id]).collect(),
            ids,
        })
    }

    /// Writes an edge attribute on every edge of the layer, or only on
    /// `edges`. Edges of a newly created attribute that are not written
    /// start at 0.
    pub fn add_attributes_edges(
        &mut self,
        layer: &str,
        attribute: &str,
        values: EdgeValues,
        edges: Option<&[EdgeId]>,
    ) -> Result<(), EpinetError> {
        self.layer_mut(layer)?.set_attribute(attribute, values, edges)
    }

    pub fn edge_attribute(
        &self,
        layer: &str,
        attribute: &str,
        edge: EdgeId,
    ) -> Result<f64, EpinetError> {
        let layer = self.layer(layer)?;
        let column = layer.edge_attribute(attribute).ok_or_else(|| {
            EpinetError::UnknownAttribute(format!("{attribute} (layer '{}')", layer.label))
        })?;
        column.get(edge).copied().ok_or_else(|| {
            EpinetError::InvalidParameter(format!(
                "edge {edge} doesn't exist in layer '{}'",
                layer.label
            ))
        })
    }

    pub fn degree(&self, layer: &str, agent: AgentId) -> Result<usize, EpinetError> {
        self.check_agents(&[agent])?;
        Ok(self.layer(layer)?.graph.degree(agent))
    }

    fn check_agents(&self, ids: &[AgentId]) -> Result<(), EpinetError> {
        match ids.iter().find(|&&id| id >= self.size) {
            Some(&agent) => Err(EpinetError::AgentOutOfRange {
                agent,
                population_size: self.size,
            }),
            None => Ok(()),
        }
    }
}
