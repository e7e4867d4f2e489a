use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cascade_core::{CoupledModel, DiffusionRng, EpochSnapshot, MultilayerNetwork, Result};

/// One full stochastic run: the per-epoch snapshot series from seeding
/// (epoch 0) to termination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realization {
    pub snapshots: Vec<EpochSnapshot>,
}

impl Realization {
    /// Number of recorded epochs, including epoch 0.
    pub fn epochs(&self) -> usize {
        self.snapshots.len()
    }

    pub fn initial(&self) -> Option<&EpochSnapshot> {
        self.snapshots.first()
    }

    pub fn final_snapshot(&self) -> Option<&EpochSnapshot> {
        self.snapshots.last()
    }
}

/// Executes one realization: seeds the network, then steps until
/// `max_epochs` or until an epoch produces zero state changes (fixed
/// point). Epoch 0 records the seeded state before any transition.
pub fn run_once(
    model: &CoupledModel,
    net: &mut MultilayerNetwork,
    max_epochs: usize,
    rng: &mut DiffusionRng,
) -> Result<Realization> {
    model.seed_network(net, rng)?;
    let mut snapshots = vec![model.count_states(net)?];

    for epoch in 1..=max_epochs {
        let outcome = model.evaluate_network_step(net, rng)?;
        snapshots.push(outcome.snapshot);
        if outcome.changes == 0 {
            debug!(epoch, "fixed point reached");
            break;
        }
    }
    Ok(Realization { snapshots })
}

/// Configuration of a multi-run experiment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub realizations: usize,
    pub max_epochs: usize,
    pub seed: u64,
}

/// Executes `realizations` independent stochastic runs in parallel, each
/// with its own RNG stream derived from the global seed and a fresh
/// network from the factory. A single failing realization aborts the
/// whole ensemble; silently dropping it would bias the aggregate.
pub fn run_many<M, N>(model_factory: M, network_factory: N, config: &RunConfig) -> Result<Ensemble>
where
    M: Fn() -> Result<CoupledModel> + Sync,
    N: Fn() -> MultilayerNetwork + Sync,
{
    let realizations = (0..config.realizations)
        .into_par_iter()
        .map(|run_id| {
            let model = model_factory()?;
            let mut net = network_factory();
            let mut rng = DiffusionRng::for_run(config.seed, run_id as u64);
            let realization = run_once(&model, &mut net, config.max_epochs, &mut rng)?;
            debug!(run_id, epochs = realization.epochs(), "realization finished");
            Ok(realization)
        })
        .collect::<Result<Vec<Realization>>>()?;

    info!(
        realizations = realizations.len(),
        max_epochs = config.max_epochs,
        seed = config.seed,
        "ensemble complete"
    );
    Ok(Ensemble { realizations })
}

/// Mean and population standard deviation of one column at one epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesStat {
    pub mean: f64,
    pub std_dev: f64,
}

/// Per-epoch mean/std series per (process, state) column, aggregated
/// across all realizations of an ensemble.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub epochs: usize,
    /// Keyed by `process.state`.
    pub columns: BTreeMap<String, Vec<SeriesStat>>,
}

/// Column key used by [`AggregatedSeries`] and [`EnsembleSummary`].
pub fn column_key(process: &str, state: &str) -> String {
    format!("{process}.{state}")
}

/// Mean initial/final counts and mean epoch count of an ensemble.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EnsembleSummary {
    pub mean_epochs: f64,
    pub initial: BTreeMap<String, f64>,
    pub r#final: BTreeMap<String, f64>,
}

/// A collection of independent realizations of the same experiment.
#[derive(Clone, Debug, Default)]
pub struct Ensemble {
    pub realizations: Vec<Realization>,
}

impl Ensemble {
    pub fn new(realizations: Vec<Realization>) -> Self {
        Self { realizations }
    }

    pub fn len(&self) -> usize {
        self.realizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realizations.is_empty()
    }

    fn column_set(&self) -> BTreeSet<(String, String)> {
        self.realizations
            .iter()
            .filter_map(Realization::initial)
            .flat_map(EpochSnapshot::columns)
            .collect()
    }

    /// Fill-forward value of one column at one epoch: realizations that
    /// converged early hold their last recorded value.
    fn value_at(realization: &Realization, epoch: usize, process: &str, state: &str) -> f64 {
        match realization.snapshots.len() {
            0 => 0.0,
            len => realization.snapshots[epoch.min(len - 1)].count(process, state) as f64,
        }
    }

    /// Index-aligned elementwise mean and population standard deviation
    /// (divisor = number of realizations) per epoch per column. Series
    /// shorter than the longest one are padded by fill-forward of their
    /// last value, so early-converging realizations still contribute to
    /// later epochs.
    pub fn aggregate(&self) -> AggregatedSeries {
        let n_runs = self.realizations.len();
        if n_runs == 0 {
            return AggregatedSeries::default();
        }
        let epochs = self
            .realizations
            .iter()
            .map(Realization::epochs)
            .max()
            .unwrap_or(0);

        let mut columns = BTreeMap::new();
        for (process, state) in self.column_set() {
            let mut series = Vec::with_capacity(epochs);
            for epoch in 0..epochs {
                let values: Vec<f64> = self
                    .realizations
                    .iter()
                    .map(|r| Self::value_at(r, epoch, &process, &state))
                    .collect();
                let mean = values.iter().sum::<f64>() / n_runs as f64;
                let variance = values
                    .iter()
                    .map(|v| (v - mean).powi(2))
                    .sum::<f64>()
                    / n_runs as f64;
                series.push(SeriesStat {
                    mean,
                    std_dev: variance.sqrt(),
                });
            }
            columns.insert(column_key(&process, &state), series);
        }
        AggregatedSeries { epochs, columns }
    }

    /// Cross-run means of epoch count and of the initial and final
    /// counts per column.
    pub fn summary(&self) -> EnsembleSummary {
        let n_runs = self.realizations.len();
        if n_runs == 0 {
            return EnsembleSummary::default();
        }
        let mean_epochs = self
            .realizations
            .iter()
            .map(|r| r.epochs() as f64)
            .sum::<f64>()
            / n_runs as f64;

        let mut initial = BTreeMap::new();
        let mut r#final = BTreeMap::new();
        for (process, state) in self.column_set() {
            let start = self
                .realizations
                .iter()
                .filter_map(Realization::initial)
                .map(|snap| snap.count(&process, &state) as f64)
                .sum::<f64>()
                / n_runs as f64;
            let end = self
                .realizations
                .iter()
                .filter_map(Realization::final_snapshot)
                .map(|snap| snap.count(&process, &state) as f64)
                .sum::<f64>()
                / n_runs as f64;
            let key = column_key(&process, &state);
            initial.insert(key.clone(), start);
            r#final.insert(key, end);
        }

        EnsembleSummary {
            mean_epochs,
            initial,
            r#final,
        }
    }
}
