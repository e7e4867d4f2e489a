use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CascadeError, Result};
use crate::ActorId;

/// One layer of a multilayer network: an adjacency structure over actor
/// ids plus the current state of each actor in the process this layer
/// carries. Adjacency is kept in ordered maps so neighbor iteration is
/// ascending by actor id, which pins down the engine's first-match
/// evaluation order.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    directed: bool,
    adjacency: BTreeMap<ActorId, BTreeSet<ActorId>>,
    states: BTreeMap<ActorId, String>,
}

impl Layer {
    pub fn undirected() -> Self {
        Self {
            directed: false,
            ..Self::default()
        }
    }

    pub fn directed() -> Self {
        Self {
            directed: true,
            ..Self::default()
        }
    }

    pub fn from_edges(directed: bool, edges: &[(ActorId, ActorId)]) -> Self {
        let mut layer = if directed {
            Self::directed()
        } else {
            Self::undirected()
        };
        for &(u, v) in edges {
            layer.add_edge(u, v);
        }
        layer
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn add_actor(&mut self, id: ActorId) {
        self.adjacency.entry(id).or_default();
    }

    /// Adds an edge, creating endpoints as needed. Self-loops are ignored.
    pub fn add_edge(&mut self, u: ActorId, v: ActorId) {
        if u == v {
            return;
        }
        self.adjacency.entry(u).or_default().insert(v);
        self.adjacency.entry(v).or_default();
        if !self.directed {
            self.adjacency.entry(v).or_default().insert(u);
        }
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.adjacency.contains_key(&id)
    }

    pub fn actor_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Actor ids in ascending order.
    pub fn actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Out-neighbors of `id` in ascending order. Empty for unknown actors.
    pub fn neighbors(&self, id: ActorId) -> impl Iterator<Item = ActorId> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn degree(&self, id: ActorId) -> usize {
        self.adjacency.get(&id).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn has_edge(&self, u: ActorId, v: ActorId) -> bool {
        self.adjacency
            .get(&u)
            .map(|set| set.contains(&v))
            .unwrap_or(false)
    }

    pub fn state_of(&self, id: ActorId) -> Option<&str> {
        self.states.get(&id).map(String::as_str)
    }

    pub fn set_state(&mut self, id: ActorId, state: String) {
        self.states.insert(id, state);
    }
}

/// A multiplex network: one layer per process, all layers sharing the
/// same actor-id universe. Mutated in place by the engine (one state per
/// actor per layer) and owned exclusively by a running realization.
#[derive(Clone, Debug, Default)]
pub struct MultilayerNetwork {
    layers: BTreeMap<String, Layer>,
}

impl MultilayerNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replicates one layer's topology under several process names, the
    /// common way to build a multiplex network from a single graph.
    pub fn from_layer(layer: Layer, process_names: &[&str]) -> Self {
        let mut net = Self::new();
        for name in process_names {
            net.add_layer(name, layer.clone());
        }
        net
    }

    pub fn from_layers(layers: Vec<(&str, Layer)>) -> Self {
        let mut net = Self::new();
        for (name, layer) in layers {
            net.add_layer(name, layer);
        }
        net
    }

    pub fn add_layer(&mut self, process_name: &str, layer: Layer) {
        self.layers.insert(process_name.to_string(), layer);
    }

    pub fn layer(&self, process_name: &str) -> Result<&Layer> {
        self.layers.get(process_name).ok_or_else(|| {
            CascadeError::InvalidNetwork(format!("no layer for process '{process_name}'"))
        })
    }

    pub fn layer_mut(&mut self, process_name: &str) -> Result<&mut Layer> {
        self.layers.get_mut(process_name).ok_or_else(|| {
            CascadeError::InvalidNetwork(format!("no layer for process '{process_name}'"))
        })
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// Actor ids of the first layer, ascending. Meaningful once the
    /// multiplex invariant holds (every layer shares this set).
    pub fn actors(&self) -> Vec<ActorId> {
        self.layers
            .values()
            .next()
            .map(|layer| layer.actors().collect())
            .unwrap_or_default()
    }

    pub fn actor_count(&self) -> usize {
        self.layers
            .values()
            .next()
            .map(Layer::actor_count)
            .unwrap_or(0)
    }

    /// True when every layer holds an identical actor-id set.
    pub fn is_multiplex(&self) -> bool {
        let mut layers = self.layers.values();
        let Some(first) = layers.next() else {
            return false;
        };
        let reference: BTreeSet<ActorId> = first.actors().collect();
        layers.all(|layer| layer.actors().collect::<BTreeSet<_>>() == reference)
    }

    /// The actor's current state in every process. Fails when a layer
    /// does not know the actor or its state was never set, which breaks
    /// the multiplex precondition.
    pub fn composite_state(&self, actor: ActorId) -> Result<BTreeMap<String, String>> {
        let mut composite = BTreeMap::new();
        for (process, layer) in &self.layers {
            let state = layer.state_of(actor).ok_or_else(|| {
                CascadeError::InvalidNetwork(format!(
                    "actor {actor} has no state in layer '{process}'"
                ))
            })?;
            composite.insert(process.clone(), state.to_string());
        }
        Ok(composite)
    }
}
