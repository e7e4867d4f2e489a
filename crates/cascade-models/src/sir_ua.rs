use cascade_core::{CompartmentalGraph, CoupledModel, Result, SeedSelector};
use serde::{Deserialize, Serialize};

/// Parameters of the SIR~UA model: an epidemic process ("contagion",
/// states S/I/R) and an awareness process ("awareness", states U/A)
/// spreading in separate layers, each conditioning the other's rates.
///
/// Possible transitions:
///
/// ```text
///     S·U ──▶ I·U ──▶ R·U
///      │       │       │
///      ▼       ▼       ▼
///     S·A ──▶ I·A ──▶ R·A
/// ```
///
/// All transitions except I -> R are driven by neighbor interactions;
/// I -> R is spontaneous. Awareness suppresses contagion when
/// `alpha_prime < alpha`; contagion pressures awareness uptake through
/// `delta` and `epsilon`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SirUaParams {
    /// S -> I for unaware actors.
    pub alpha: f64,
    /// I -> R for unaware actors.
    pub beta: f64,
    /// S -> I for aware actors.
    pub alpha_prime: f64,
    /// I -> R for aware actors.
    pub beta_prime: f64,
    /// U -> A for susceptible actors.
    pub gamma: f64,
    /// U -> A for infected actors.
    pub delta: f64,
    /// U -> A for removed actors.
    pub epsilon: f64,
    /// Initial % of infected actors.
    pub ill_seeds: f64,
    /// Initial % of removed actors.
    pub removed_seeds: f64,
    /// Initial % of aware actors.
    pub aware_seeds: f64,
}

impl SirUaParams {
    /// Reference parameterization of the SIR~UA experiment.
    pub fn baseline() -> Self {
        Self {
            alpha: 0.19,
            beta: 0.10,
            alpha_prime: 0.019,
            beta_prime: 0.10,
            gamma: 0.01,
            delta: 0.71,
            epsilon: 0.01,
            ill_seeds: 5.0,
            removed_seeds: 0.0,
            aware_seeds: 5.0,
        }
    }

    /// Flu variant with exponential awareness coupling: awareness damps
    /// infection by `e^{-lambda}` and speeds up removal by `e^{lambda}`.
    /// `lambda` must stay below `ln(1/beta)` or the boosted removal rate
    /// leaves [0, 1] and `build` fails.
    pub fn flu(lambda: f64) -> Self {
        const ALPHA: f64 = 0.3;
        const BETA: f64 = 0.1;
        Self {
            alpha: ALPHA,
            beta: BETA,
            alpha_prime: ALPHA * (-lambda).exp(),
            beta_prime: BETA * lambda.exp(),
            gamma: 0.25,
            delta: 0.5,
            epsilon: 1.0,
            ill_seeds: 5.0,
            removed_seeds: 5.0,
            aware_seeds: 5.0,
        }
    }

    /// Builds the coupled model: declares both processes, sets the seven
    /// conditional transition weights, compiles with background weight 0
    /// (no spontaneous transitions beyond those declared) and marks
    /// I -> R as interaction-free.
    pub fn build(&self, selector: Box<dyn SeedSelector>) -> Result<CoupledModel> {
        let mut graph = CompartmentalGraph::new();
        graph.declare_process(
            "contagion",
            &["S", "I", "R"],
            &[
                ("I", self.ill_seeds),
                ("S", 100.0 - self.ill_seeds - self.removed_seeds),
                ("R", self.removed_seeds),
            ],
        )?;
        graph.declare_process(
            "awareness",
            &["U", "A"],
            &[("A", self.aware_seeds), ("U", 100.0 - self.aware_seeds)],
        )?;

        // SIR rates while unaware
        graph.set_transition("contagion", "S", "I", &[("awareness", "U")], self.alpha)?;
        graph.set_transition("contagion", "I", "R", &[("awareness", "U")], self.beta)?;

        // SIR rates while aware
        graph.set_transition("contagion", "S", "I", &[("awareness", "A")], self.alpha_prime)?;
        graph.set_transition("contagion", "I", "R", &[("awareness", "A")], self.beta_prime)?;

        // awareness uptake per contagion state
        graph.set_transition("awareness", "U", "A", &[("contagion", "S")], self.gamma)?;
        graph.set_transition("awareness", "U", "A", &[("contagion", "I")], self.delta)?;
        graph.set_transition("awareness", "U", "A", &[("contagion", "R")], self.epsilon)?;

        graph.compile(0.0)?;

        CoupledModel::new(graph, selector)?.with_spontaneous("contagion", "I")
    }
}
