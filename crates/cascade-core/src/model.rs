use crate::compartments::CompartmentalGraph;
use crate::error::{CascadeError, Result};
use crate::network::MultilayerNetwork;
use crate::rng::DiffusionRng;
use crate::seeding::SeedSelector;
use crate::snapshot::{EpochSnapshot, StepOutcome};
use crate::ActorId;

/// One pending per-actor, per-process state assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateUpdate {
    pub actor: ActorId,
    pub process: String,
    pub state: String,
}

/// Coupled compartmental diffusion model: a compiled compartmental graph
/// plus a seed-selection strategy, evaluating two (or more) processes
/// over a multiplex network with cross-layer conditional transitions.
///
/// The model exposes per-step evaluation only; termination (epoch cap,
/// fixed point) is the runner's decision.
pub struct CoupledModel {
    compartments: CompartmentalGraph,
    selector: Box<dyn SeedSelector>,
    /// (process, from_state) pairs whose transitions need no neighbor
    /// interaction (e.g. contagion I -> R): evaluated as plain weighted
    /// coin flips on the actor's own state.
    spontaneous: Vec<(String, String)>,
}

impl CoupledModel {
    pub fn new(
        compartments: CompartmentalGraph,
        selector: Box<dyn SeedSelector>,
    ) -> Result<Self> {
        if !compartments.is_compiled() {
            return Err(CascadeError::Configuration(
                "compartmental graph must be compiled before building a model".into(),
            ));
        }
        Ok(Self {
            compartments,
            selector,
            spontaneous: Vec::new(),
        })
    }

    /// Marks transitions out of `(process, from_state)` as spontaneous.
    pub fn with_spontaneous(mut self, process: &str, from_state: &str) -> Result<Self> {
        let proc = self.compartments.process(process).ok_or_else(|| {
            CascadeError::Configuration(format!("unknown process '{process}'"))
        })?;
        if !proc.states.iter().any(|s| s == from_state) {
            return Err(CascadeError::Configuration(format!(
                "'{from_state}' is not a state of process '{process}'"
            )));
        }
        self.spontaneous
            .push((process.to_string(), from_state.to_string()));
        Ok(self)
    }

    pub fn compartments(&self) -> &CompartmentalGraph {
        &self.compartments
    }

    pub fn describe(&self) -> String {
        format!(
            "{}seed selection: {}\n",
            self.compartments.describe(),
            self.selector.describe()
        )
    }

    /// Computes the initial state of every actor in every process: each
    /// process's budget counts are assigned along the selector's ranking
    /// in budget-enumeration order. Does not touch the network.
    pub fn determine_initial_states(
        &self,
        net: &MultilayerNetwork,
        rng: &mut DiffusionRng,
    ) -> Result<Vec<StateUpdate>> {
        if !net.is_multiplex() {
            return Err(CascadeError::InvalidNetwork(
                "model requires a multiplex network (identical actor set per layer)".into(),
            ));
        }
        let actor_count = net.actor_count();
        let budgets = self.compartments.seeding_budget_for_network(actor_count);

        let mut updates = Vec::with_capacity(actor_count * self.compartments.processes().len());
        for process in self.compartments.processes() {
            let ranking = self.selector.rank(net, &process.name, rng)?;
            if ranking.len() != actor_count {
                return Err(CascadeError::InvalidNetwork(format!(
                    "ranking for '{}' covers {} of {} actors",
                    process.name,
                    ranking.len(),
                    actor_count
                )));
            }

            let mut ranked = ranking.into_iter();
            for (state, count) in &budgets[&process.name] {
                for actor in ranked.by_ref().take(*count) {
                    updates.push(StateUpdate {
                        actor,
                        process: process.name.clone(),
                        state: state.clone(),
                    });
                }
            }
            // budget counts sum to the actor count, so this only fires if
            // the budget under-covers; default to the baseline state
            let baseline = &process.states[0];
            for actor in ranked {
                updates.push(StateUpdate {
                    actor,
                    process: process.name.clone(),
                    state: baseline.clone(),
                });
            }
        }
        Ok(updates)
    }

    /// Seeds the network in place: determines initial states and writes
    /// them to the layers.
    pub fn seed_network(
        &self,
        net: &mut MultilayerNetwork,
        rng: &mut DiffusionRng,
    ) -> Result<()> {
        let updates = self.determine_initial_states(net, rng)?;
        apply_updates(net, updates)
    }

    /// Evaluates one actor in one process against the network's current
    /// (pre-step) states and returns its next state.
    ///
    /// Spontaneous transitions are single weighted coin flips. All other
    /// transitions are neighbor-driven: neighbors are scanned in
    /// ascending id order and the first one whose current state is a
    /// listed destination and whose coin flip succeeds wins.
    pub fn evaluate_actor(
        &self,
        actor: ActorId,
        process: &str,
        net: &MultilayerNetwork,
        rng: &mut DiffusionRng,
    ) -> Result<String> {
        let layer = net.layer(process)?;
        let current = layer.state_of(actor).ok_or_else(|| {
            CascadeError::InvalidNetwork(format!(
                "actor {actor} has no state in layer '{process}'"
            ))
        })?;
        let composite = net.composite_state(actor)?;
        let transitions = self.compartments.possible_transitions(&composite, process)?;
        if transitions.is_empty() {
            return Ok(current.to_string());
        }

        if self
            .spontaneous
            .iter()
            .any(|(p, from)| p == process && from == current)
        {
            for (to, weight) in &transitions {
                if rng.chance(*weight) {
                    return Ok(to.clone());
                }
            }
        } else {
            for neighbor in layer.neighbors(actor) {
                let neighbor_state = layer.state_of(neighbor).ok_or_else(|| {
                    CascadeError::InvalidNetwork(format!(
                        "actor {neighbor} has no state in layer '{process}'"
                    ))
                })?;
                if let Some(weight) = transitions.get(neighbor_state) {
                    if rng.chance(*weight) {
                        return Ok(neighbor_state.to_string());
                    }
                }
            }
        }
        Ok(current.to_string())
    }

    /// One synchronous epoch: every actor in every process is evaluated
    /// against the pre-step snapshot, then all new states are committed
    /// at once, so no actor observes another actor's same-epoch update.
    pub fn evaluate_network_step(
        &self,
        net: &mut MultilayerNetwork,
        rng: &mut DiffusionRng,
    ) -> Result<StepOutcome> {
        let mut updates = Vec::new();
        let mut changes = 0usize;
        for process in self.compartments.processes() {
            let layer = net.layer(&process.name)?;
            for actor in layer.actors() {
                let next = self.evaluate_actor(actor, &process.name, net, rng)?;
                if layer.state_of(actor) != Some(next.as_str()) {
                    changes += 1;
                }
                updates.push(StateUpdate {
                    actor,
                    process: process.name.clone(),
                    state: next,
                });
            }
        }

        apply_updates(net, updates)?;
        Ok(StepOutcome {
            snapshot: self.count_states(net)?,
            changes,
        })
    }

    /// Counts actors per state per process. Legal states that no actor
    /// currently holds are reported as 0 so series have stable columns.
    pub fn count_states(&self, net: &MultilayerNetwork) -> Result<EpochSnapshot> {
        let mut snapshot = EpochSnapshot::new();
        for process in self.compartments.processes() {
            for state in &process.states {
                snapshot.set_count(&process.name, state, 0);
            }
            let layer = net.layer(&process.name)?;
            for actor in layer.actors() {
                let state = layer.state_of(actor).ok_or_else(|| {
                    CascadeError::InvalidNetwork(format!(
                        "actor {actor} has no state in layer '{}'",
                        process.name
                    ))
                })?;
                snapshot.increment(&process.name, state);
            }
        }
        Ok(snapshot)
    }
}

fn apply_updates(net: &mut MultilayerNetwork, updates: Vec<StateUpdate>) -> Result<()> {
    for update in updates {
        let layer = net.layer_mut(&update.process)?;
        if !layer.contains(update.actor) {
            return Err(CascadeError::InvalidNetwork(format!(
                "actor {} is absent from layer '{}'",
                update.actor, update.process
            )));
        }
        layer.set_state(update.actor, update.state);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Layer;
    use crate::seeding::RandomSeedSelector;

    /// Single process {A, B}; rule A -> B conditioned only on meeting a
    /// B neighbor, weight 1.0, background 0.
    fn two_state_model() -> CoupledModel {
        let mut graph = CompartmentalGraph::new();
        graph
            .declare_process("p", &["A", "B"], &[("A", 100.0), ("B", 0.0)])
            .unwrap();
        graph.set_transition("p", "A", "B", &[], 1.0).unwrap();
        graph.compile(0.0).unwrap();
        CoupledModel::new(graph, Box::new(RandomSeedSelector)).unwrap()
    }

    fn two_node_net() -> MultilayerNetwork {
        MultilayerNetwork::from_layer(Layer::from_edges(false, &[(1, 2)]), &["p"])
    }

    #[test]
    fn deterministic_contagion_reaches_fixed_point() {
        let model = two_state_model();
        let mut net = two_node_net();
        // force-seed node 1 as B, node 2 as A
        net.layer_mut("p").unwrap().set_state(1, "B".into());
        net.layer_mut("p").unwrap().set_state(2, "A".into());

        let mut rng = DiffusionRng::new(0);

        // weight 1.0 is deterministic: node 2 must flip after one epoch
        let outcome = model.evaluate_network_step(&mut net, &mut rng).unwrap();
        assert_eq!(net.layer("p").unwrap().state_of(2), Some("B"));
        assert_eq!(outcome.changes, 1);
        assert_eq!(outcome.snapshot.count("p", "B"), 2);

        // second epoch: everything is B, nothing can move
        let outcome = model.evaluate_network_step(&mut net, &mut rng).unwrap();
        assert_eq!(outcome.changes, 0);
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let model = two_state_model();
        let mut net = two_node_net();
        net.layer_mut("p").unwrap().set_state(1, "B".into());
        net.layer_mut("p").unwrap().set_state(2, "B".into());

        let mut rng = DiffusionRng::new(0);
        for _ in 0..5 {
            let outcome = model.evaluate_network_step(&mut net, &mut rng).unwrap();
            assert_eq!(outcome.changes, 0);
        }
    }

    #[test]
    fn spontaneous_transition_ignores_neighbors() {
        let mut graph = CompartmentalGraph::new();
        graph
            .declare_process("p", &["A", "B"], &[("A", 100.0), ("B", 0.0)])
            .unwrap();
        graph.set_transition("p", "A", "B", &[], 1.0).unwrap();
        graph.compile(0.0).unwrap();
        let model = CoupledModel::new(graph, Box::new(RandomSeedSelector))
            .unwrap()
            .with_spontaneous("p", "A")
            .unwrap();

        // isolated actor: neighbor-driven evaluation could never fire
        let mut layer = Layer::undirected();
        layer.add_actor(0);
        let mut net = MultilayerNetwork::from_layer(layer, &["p"]);
        net.layer_mut("p").unwrap().set_state(0, "A".into());

        let mut rng = DiffusionRng::new(0);
        let next = model.evaluate_actor(0, "p", &net, &mut rng).unwrap();
        assert_eq!(next, "B");
    }

    #[test]
    fn seeding_respects_budget_order() {
        let mut graph = CompartmentalGraph::new();
        graph
            .declare_process("p", &["A", "B"], &[("B", 50.0), ("A", 50.0)])
            .unwrap();
        graph.compile(0.0).unwrap();
        let model = CoupledModel::new(graph, Box::new(RankByIdSelector)).unwrap();

        let layer = Layer::from_edges(false, &[(0, 1), (1, 2), (2, 3)]);
        let mut net = MultilayerNetwork::from_layer(layer, &["p"]);
        let mut rng = DiffusionRng::new(0);
        model.seed_network(&mut net, &mut rng).unwrap();

        // first budget entry (B) lands on the top of the ranking
        let layer = net.layer("p").unwrap();
        assert_eq!(layer.state_of(0), Some("B"));
        assert_eq!(layer.state_of(1), Some("B"));
        assert_eq!(layer.state_of(2), Some("A"));
        assert_eq!(layer.state_of(3), Some("A"));
    }

    #[test]
    fn non_multiplex_network_is_rejected() {
        let model = two_state_model();
        let mut net = MultilayerNetwork::new();
        net.add_layer("p", Layer::from_edges(false, &[(0, 1)]));
        net.add_layer("q", Layer::from_edges(false, &[(0, 2)]));

        let mut rng = DiffusionRng::new(0);
        let err = model.determine_initial_states(&net, &mut rng);
        assert!(matches!(err, Err(CascadeError::InvalidNetwork(_))));
    }

    #[test]
    fn missing_actor_state_is_fatal() {
        let model = two_state_model();
        let net = two_node_net(); // states never seeded
        let mut rng = DiffusionRng::new(0);
        let err = model.evaluate_actor(1, "p", &net, &mut rng);
        assert!(matches!(err, Err(CascadeError::InvalidNetwork(_))));
    }

    /// Deterministic selector for assertions on assignment order.
    struct RankByIdSelector;

    impl SeedSelector for RankByIdSelector {
        fn rank(
            &self,
            net: &MultilayerNetwork,
            process: &str,
            _rng: &mut DiffusionRng,
        ) -> Result<Vec<ActorId>> {
            Ok(net.layer(process)?.actors().collect())
        }

        fn describe(&self) -> String {
            "ascending-id seed selection".to_string()
        }
    }
}
