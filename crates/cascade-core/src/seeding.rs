use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::network::{Layer, MultilayerNetwork};
use crate::rng::DiffusionRng;
use crate::ActorId;

/// Strategy for ranking actors before initial-state assignment. The
/// returned sequence is a permutation of all actors in the process's
/// layer, ordered by decreasing priority for receiving an advanced
/// seeded state (Infected, Aware).
pub trait SeedSelector: Send + Sync {
    fn rank(
        &self,
        net: &MultilayerNetwork,
        process: &str,
        rng: &mut DiffusionRng,
    ) -> Result<Vec<ActorId>>;

    /// Short description for logging.
    fn describe(&self) -> String;
}

/// Uniformly random ranking, reproducible given a fixed seed on the
/// injected random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSeedSelector;

impl SeedSelector for RandomSeedSelector {
    fn rank(
        &self,
        net: &MultilayerNetwork,
        process: &str,
        rng: &mut DiffusionRng,
    ) -> Result<Vec<ActorId>> {
        let mut actors: Vec<ActorId> = net.layer(process)?.actors().collect();
        rng.shuffle(&mut actors);
        Ok(actors)
    }

    fn describe(&self) -> String {
        "random seed selection".to_string()
    }
}

/// Centrality-based ranking after Berahmand, Bouyer and Samadi (2018):
/// a clustering-coefficient measure for identifying influential
/// spreaders. Deterministic given the network; the random source is
/// unused.
#[derive(Clone, Copy, Debug, Default)]
pub struct BerahmandSelector;

impl SeedSelector for BerahmandSelector {
    fn rank(
        &self,
        net: &MultilayerNetwork,
        process: &str,
        _rng: &mut DiffusionRng,
    ) -> Result<Vec<ActorId>> {
        let layer = net.layer(process)?;
        let scores = berahmand_centrality(layer);
        let mut ranked: Vec<(ActorId, f64)> = scores.into_iter().collect();
        // descending score, ties ascending id for reproducibility
        ranked.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(id_a.cmp(id_b))
        });
        Ok(ranked.into_iter().map(|(id, _)| id).collect())
    }

    fn describe(&self) -> String {
        "Berahmand centrality-based seed selection".to_string()
    }
}

/// Per-node Berahmand centrality: with degree `k`, local clustering
/// coefficient `cc` and the two-hop neighborhood (union of the
/// neighbors' neighbor sets minus the node itself),
/// `score = k / (cc + 1/k) + Σ cc(two-hop neighbor)`.
/// Isolated nodes (`k = 0`) score 0 rather than dividing by zero.
pub fn berahmand_centrality(layer: &Layer) -> BTreeMap<ActorId, f64> {
    let clustering: BTreeMap<ActorId, f64> = layer
        .actors()
        .map(|id| (id, local_clustering(layer, id)))
        .collect();

    let mut scores = BTreeMap::new();
    for node in layer.actors() {
        let k = layer.degree(node);
        if k == 0 {
            scores.insert(node, 0.0);
            continue;
        }
        let cc = clustering[&node];

        let mut two_hop = BTreeSet::new();
        for neighbor in layer.neighbors(node) {
            two_hop.extend(layer.neighbors(neighbor));
        }
        two_hop.remove(&node);

        let two_hop_cc: f64 = two_hop.iter().map(|id| clustering[id]).sum();
        let score = k as f64 / (cc + 1.0 / k as f64) + two_hop_cc;
        scores.insert(node, score);
    }
    scores
}

/// Standard local clustering coefficient: fraction of closed triangles
/// among the node's neighbor pairs. Nodes of degree < 2 score 0.
fn local_clustering(layer: &Layer, node: ActorId) -> f64 {
    let neighbors: Vec<ActorId> = layer.neighbors(node).collect();
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }
    let mut links = 0usize;
    for (i, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[i + 1..] {
            if layer.has_edge(a, b) || layer.has_edge(b, a) {
                links += 1;
            }
        }
    }
    2.0 * links as f64 / (k * (k - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_layer_net(edges: &[(ActorId, ActorId)]) -> MultilayerNetwork {
        MultilayerNetwork::from_layer(Layer::from_edges(false, edges), &["p"])
    }

    #[test]
    fn clustering_of_triangle_is_one() {
        let layer = Layer::from_edges(false, &[(0, 1), (1, 2), (0, 2)]);
        for node in 0..3 {
            assert_abs_diff_eq!(local_clustering(&layer, node), 1.0);
        }
    }

    #[test]
    fn clustering_of_path_is_zero() {
        let layer = Layer::from_edges(false, &[(0, 1), (1, 2)]);
        assert_abs_diff_eq!(local_clustering(&layer, 1), 0.0);
    }

    #[test]
    fn star_center_outranks_tied_leaves() {
        // Star: center 0 with k leaves; clustering is 0 everywhere.
        let k = 6;
        let edges: Vec<(ActorId, ActorId)> = (1..=k).map(|leaf| (0, leaf)).collect();
        let layer = Layer::from_edges(false, &edges);
        let scores = berahmand_centrality(&layer);

        // center: k / (0 + 1/k) = k^2; leaf: 1 / (0 + 1) = 1
        assert_abs_diff_eq!(scores[&0], (k * k) as f64, epsilon = 1e-9);
        for leaf in 1..=k {
            assert_abs_diff_eq!(scores[&leaf], 1.0, epsilon = 1e-9);
            assert!(scores[&0] > scores[&leaf]);
        }
    }

    #[test]
    fn isolated_nodes_score_zero_and_rank_last() {
        let mut layer = Layer::from_edges(false, &[(0, 1), (1, 2)]);
        layer.add_actor(9);
        let net = MultilayerNetwork::from_layer(layer, &["p"]);

        let scores = berahmand_centrality(net.layer("p").unwrap());
        assert_abs_diff_eq!(scores[&9], 0.0);

        let mut rng = DiffusionRng::new(0);
        let ranking = BerahmandSelector.rank(&net, "p", &mut rng).unwrap();
        assert_eq!(*ranking.last().unwrap(), 9);
    }

    #[test]
    fn ranking_is_a_permutation() {
        let net = single_layer_net(&[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]);
        let mut rng = DiffusionRng::new(3);

        for selector in [&RandomSeedSelector as &dyn SeedSelector, &BerahmandSelector] {
            let ranking = selector.rank(&net, "p", &mut rng).unwrap();
            let mut sorted = ranking.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn random_ranking_reproducible_under_fixed_seed() {
        let net = single_layer_net(&[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let a = RandomSeedSelector
            .rank(&net, "p", &mut DiffusionRng::new(11))
            .unwrap();
        let b = RandomSeedSelector
            .rank(&net, "p", &mut DiffusionRng::new(11))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        // Two disconnected edges: all four nodes tie, ids decide.
        let net = single_layer_net(&[(3, 2), (1, 0)]);
        let mut rng = DiffusionRng::new(0);
        let ranking = BerahmandSelector.rank(&net, "p", &mut rng).unwrap();
        assert_eq!(ranking, vec![0, 1, 2, 3]);
    }
}
