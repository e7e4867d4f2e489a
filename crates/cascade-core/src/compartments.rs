use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, Result};

const BUDGET_TOLERANCE: f64 = 1e-6;

/// One named dimension of state (e.g. "contagion" with states S, I, R).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    /// Legal states, in declaration order.
    pub states: Vec<String>,
    /// Percentage of actors initialized into each state. Order is
    /// significant: seeding assigns states along the actor ranking in
    /// this order, so advanced states (I, A) listed first land on the
    /// top-ranked actors.
    pub seeding_budget: Vec<(String, f64)>,
}

/// Complete assignment of one state per *other* process. For the
/// transition `contagion.S -> contagion.I` conditioned on `awareness.U`,
/// the conditioning is `{awareness: U}`.
pub type Conditioning = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TransitionKey {
    process: String,
    from: String,
    conditioning: Conditioning,
}

/// Declares processes, their legal states, seeding budgets, and the
/// conditional transition-weight table of a coupled diffusion model.
///
/// Built once before simulation: declare processes, set explicit
/// transition weights, then `compile` to fill every remaining
/// (from, to, conditioning) combination with a background weight. After
/// compile the graph is immutable and read-only during simulation.
#[derive(Clone, Debug, Default)]
pub struct CompartmentalGraph {
    processes: Vec<Process>,
    table: HashMap<TransitionKey, BTreeMap<String, f64>>,
    background_weight: f64,
    compiled: bool,
}

impl CompartmentalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn process(&self, name: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.name == name)
    }

    /// Registers a process with its legal states and seeding budget.
    pub fn declare_process(
        &mut self,
        name: &str,
        states: &[&str],
        seeding_budget: &[(&str, f64)],
    ) -> Result<()> {
        if self.compiled {
            return Err(CascadeError::Configuration(
                "compartmental graph is already compiled".into(),
            ));
        }
        if self.process(name).is_some() {
            return Err(CascadeError::Configuration(format!(
                "process '{name}' is already declared"
            )));
        }
        if states.is_empty() {
            return Err(CascadeError::Configuration(format!(
                "process '{name}' has no states"
            )));
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].contains(state) {
                return Err(CascadeError::Configuration(format!(
                    "process '{name}' declares state '{state}' twice"
                )));
            }
        }
        if seeding_budget.len() != states.len() {
            return Err(CascadeError::Configuration(format!(
                "process '{name}' needs one budget entry per state ({} states, {} entries)",
                states.len(),
                seeding_budget.len()
            )));
        }
        for state in states {
            let entries = seeding_budget.iter().filter(|(s, _)| s == state).count();
            if entries != 1 {
                return Err(CascadeError::Configuration(format!(
                    "seeding budget of '{name}' must cover state '{state}' exactly once"
                )));
            }
        }
        let total: f64 = seeding_budget.iter().map(|(_, pct)| pct).sum();
        if (total - 100.0).abs() > BUDGET_TOLERANCE {
            return Err(CascadeError::Configuration(format!(
                "seeding budget of '{name}' sums to {total}, expected 100"
            )));
        }
        if seeding_budget.iter().any(|(_, pct)| *pct < 0.0) {
            return Err(CascadeError::Configuration(format!(
                "seeding budget of '{name}' has a negative entry"
            )));
        }

        self.processes.push(Process {
            name: name.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
            seeding_budget: seeding_budget
                .iter()
                .map(|(s, pct)| (s.to_string(), *pct))
                .collect(),
        });
        Ok(())
    }

    /// Registers or overwrites one transition rule. `conditioning` must
    /// assign one state to every other declared process.
    pub fn set_transition(
        &mut self,
        process: &str,
        from: &str,
        to: &str,
        conditioning: &[(&str, &str)],
        weight: f64,
    ) -> Result<()> {
        if self.compiled {
            return Err(CascadeError::Configuration(
                "compartmental graph is already compiled".into(),
            ));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(CascadeError::Configuration(format!(
                "transition weight {weight} outside [0, 1]"
            )));
        }
        let proc = self.process(process).ok_or_else(|| {
            CascadeError::Configuration(format!("unknown process '{process}'"))
        })?;
        for state in [from, to] {
            if !proc.states.iter().any(|s| s == state) {
                return Err(CascadeError::Configuration(format!(
                    "'{state}' is not a state of process '{process}'"
                )));
            }
        }
        if from == to {
            return Err(CascadeError::Configuration(format!(
                "self-transition '{process}.{from}' is not allowed"
            )));
        }

        let mut key_conditioning = Conditioning::new();
        for (cond_process, cond_state) in conditioning {
            if *cond_process == process {
                return Err(CascadeError::Configuration(format!(
                    "conditioning of a '{process}' transition cannot reference '{process}' itself"
                )));
            }
            let cond_proc = self.process(cond_process).ok_or_else(|| {
                CascadeError::Configuration(format!("unknown process '{cond_process}'"))
            })?;
            if !cond_proc.states.iter().any(|s| s == cond_state) {
                return Err(CascadeError::Configuration(format!(
                    "'{cond_state}' is not a state of process '{cond_process}'"
                )));
            }
            if key_conditioning
                .insert(cond_process.to_string(), cond_state.to_string())
                .is_some()
            {
                return Err(CascadeError::Configuration(format!(
                    "conditioning references process '{cond_process}' twice"
                )));
            }
        }
        for other in &self.processes {
            if other.name != process && !key_conditioning.contains_key(&other.name) {
                return Err(CascadeError::Configuration(format!(
                    "conditioning must assign a state to process '{}'",
                    other.name
                )));
            }
        }

        let key = TransitionKey {
            process: process.to_string(),
            from: from.to_string(),
            conditioning: key_conditioning,
        };
        self.table
            .entry(key)
            .or_default()
            .insert(to.to_string(), weight);
        Ok(())
    }

    /// Finalizes the table: every (from, to, conditioning) combination
    /// with no explicit rule receives `background_weight` (typically 0,
    /// meaning no spontaneous transition). The graph is immutable
    /// afterwards.
    pub fn compile(&mut self, background_weight: f64) -> Result<()> {
        if self.compiled {
            return Err(CascadeError::Configuration(
                "compartmental graph is already compiled".into(),
            ));
        }
        if self.processes.is_empty() {
            return Err(CascadeError::Configuration(
                "no processes declared".into(),
            ));
        }
        if !(0.0..=1.0).contains(&background_weight) {
            return Err(CascadeError::Configuration(format!(
                "background weight {background_weight} outside [0, 1]"
            )));
        }

        for i in 0..self.processes.len() {
            let process = self.processes[i].name.clone();
            let states = self.processes[i].states.clone();
            for conditioning in self.conditioning_combinations(&process) {
                for from in &states {
                    let key = TransitionKey {
                        process: process.clone(),
                        from: from.clone(),
                        conditioning: conditioning.clone(),
                    };
                    let destinations = self.table.entry(key).or_default();
                    for to in &states {
                        if to != from {
                            destinations.entry(to.clone()).or_insert(background_weight);
                        }
                    }
                }
            }
        }

        self.background_weight = background_weight;
        self.compiled = true;
        Ok(())
    }

    /// Cross product of all other processes' state sets. With a single
    /// declared process this is one empty conditioning.
    fn conditioning_combinations(&self, process: &str) -> Vec<Conditioning> {
        let mut combinations = vec![Conditioning::new()];
        for other in self.processes.iter().filter(|p| p.name != process) {
            let mut expanded = Vec::with_capacity(combinations.len() * other.states.len());
            for base in &combinations {
                for state in &other.states {
                    let mut assignment = base.clone();
                    assignment.insert(other.name.clone(), state.clone());
                    expanded.push(assignment);
                }
            }
            combinations = expanded;
        }
        combinations
    }

    /// All transitions leaving the actor's current state in `process`,
    /// given the actor's full composite state. Destinations map to their
    /// weights; zero-weight entries are omitted. Side-effect free.
    pub fn possible_transitions(
        &self,
        composite: &BTreeMap<String, String>,
        process: &str,
    ) -> Result<BTreeMap<String, f64>> {
        let proc = self.process(process).ok_or_else(|| {
            CascadeError::Configuration(format!("unknown process '{process}'"))
        })?;
        let from = composite.get(process).ok_or_else(|| {
            CascadeError::InvalidNetwork(format!(
                "composite state is missing process '{process}'"
            ))
        })?;
        if !proc.states.iter().any(|s| s == from) {
            return Err(CascadeError::InvalidNetwork(format!(
                "actor holds unknown state '{from}' in process '{process}'"
            )));
        }
        let mut conditioning = Conditioning::new();
        for other in &self.processes {
            if other.name == process {
                continue;
            }
            let state = composite.get(&other.name).ok_or_else(|| {
                CascadeError::InvalidNetwork(format!(
                    "composite state is missing process '{}'",
                    other.name
                ))
            })?;
            conditioning.insert(other.name.clone(), state.clone());
        }

        let key = TransitionKey {
            process: process.to_string(),
            from: from.clone(),
            conditioning,
        };
        let transitions = self
            .table
            .get(&key)
            .map(|destinations| {
                destinations
                    .iter()
                    .filter(|(_, weight)| **weight > 0.0)
                    .map(|(to, weight)| (to.clone(), *weight))
                    .collect()
            })
            .unwrap_or_default();
        Ok(transitions)
    }

    /// Converts percentage budgets into integer actor counts for a network
    /// of `actor_count` actors. All states but the largest-budget one are
    /// floored; the largest takes the remainder, so counts sum exactly to
    /// `actor_count` per process. Output preserves budget order.
    pub fn seeding_budget_for_network(
        &self,
        actor_count: usize,
    ) -> BTreeMap<String, Vec<(String, usize)>> {
        let mut budgets = BTreeMap::new();
        for process in &self.processes {
            let largest = process
                .seeding_budget
                .iter()
                .enumerate()
                .max_by(|(_, (_, a)), (_, (_, b))| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            let mut counts: Vec<(String, usize)> = process
                .seeding_budget
                .iter()
                .map(|(state, pct)| {
                    (state.clone(), (pct / 100.0 * actor_count as f64).floor() as usize)
                })
                .collect();
            let floored: usize = counts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != largest)
                .map(|(_, (_, count))| count)
                .sum();
            counts[largest].1 = actor_count - floored;

            budgets.insert(process.name.clone(), counts);
        }
        budgets
    }

    /// Human-readable dump of the compiled graph for logging.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        out.push_str("compartmental graph\n");
        out.push_str("processes and seeding budgets:\n");
        for process in &self.processes {
            let budget: Vec<String> = process
                .seeding_budget
                .iter()
                .map(|(state, pct)| format!("{state}:{pct}%"))
                .collect();
            out.push_str(&format!("  {}: [{}]\n", process.name, budget.join(", ")));
        }
        out.push_str("transition weights:\n");
        let mut rows: Vec<String> = self
            .table
            .iter()
            .flat_map(|(key, destinations)| {
                destinations.iter().map(move |(to, weight)| {
                    let conditioning: Vec<String> = key
                        .conditioning
                        .iter()
                        .map(|(p, s)| format!("{p}.{s}"))
                        .collect();
                    format!(
                        "  {}.{} -> {}.{} | {}: {}\n",
                        key.process,
                        key.from,
                        key.process,
                        to,
                        conditioning.join(", "),
                        weight
                    )
                })
            })
            .collect();
        rows.sort();
        for row in rows {
            out.push_str(&row);
        }
        out
    }
}
