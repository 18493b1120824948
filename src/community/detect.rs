//! Community detection.
//!
//! Primary algorithm: asynchronous weighted label propagation. Each node
//! starts with its own label and repeatedly adopts the highest-weighted
//! label among its neighbours until nothing changes. Label propagation is
//! not deterministic by construction, so node processing order is seeded
//! from a stable hash of the node ID and reshuffled with a deterministic
//! generator per iteration; results are reproducible for a fixed graph.
//!
//! A connected-components fallback grouped by an anchor entity type covers
//! backends without label propagation support.

use crate::models::{Community, CommunityId, EntityType};
use crate::storage::{GraphProjection, GraphStore};
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Which detector to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionAlgorithm {
    /// Weighted label propagation (the default).
    LabelPropagation,
    /// Connected components grouped around an anchor entity type.
    ConnectedComponents {
        /// Entity type whose nodes anchor each component.
        anchor: EntityType,
    },
}

/// Options for community detection.
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    /// Detector to run.
    pub algorithm: DetectionAlgorithm,
    /// Hierarchy depth bound; level 0 is always produced.
    pub max_levels: u32,
    /// Communities smaller than this are dropped at each level.
    pub min_community_size: usize,
    /// Label propagation iteration bound.
    pub max_iterations: usize,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            algorithm: DetectionAlgorithm::LabelPropagation,
            max_levels: 3,
            min_community_size: 2,
            max_iterations: 20,
        }
    }
}

/// Stable 64-bit seed for a node ID.
///
/// Shared by every deterministic ordering decision in this module so a
/// fixed graph always partitions the same way.
#[must_use]
pub fn stable_seed(id: &str) -> u64 {
    let digest = Sha256::digest(id.as_bytes());
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

/// Runs weighted label propagation over an adjacency map.
///
/// Returns the partition as member lists, each sorted, ordered by
/// descending size then first member.
#[must_use]
pub fn label_propagation(
    adjacency: &BTreeMap<String, Vec<(String, f32)>>,
    max_iterations: usize,
) -> Vec<Vec<String>> {
    if adjacency.is_empty() {
        return Vec::new();
    }

    // Initial order is seeded by the stable node hash.
    let mut order: Vec<&String> = adjacency.keys().collect();
    order.sort_by_key(|id| (stable_seed(id), (*id).clone()));

    let mut labels: HashMap<&String, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    for iteration in 0..max_iterations {
        // Deterministic Fisher-Yates reshuffle per iteration.
        let mut seed: u64 = (iteration as u64)
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        for i in (1..order.len()).rev() {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            #[allow(clippy::cast_possible_truncation)]
            let j = ((seed >> 33) as usize) % (i + 1);
            order.swap(i, j);
        }

        let mut changed = false;
        for id in &order {
            let Some(neighbours) = adjacency.get(*id) else {
                continue;
            };
            if neighbours.is_empty() {
                continue;
            }
            let mut votes: BTreeMap<usize, f32> = BTreeMap::new();
            for (neighbour, weight) in neighbours {
                if let Some(&label) = labels.get(neighbour) {
                    *votes.entry(label).or_insert(0.0) += weight.max(f32::MIN_POSITIVE);
                }
            }
            // Highest weight wins; ties go to the smaller label.
            let Some((&best, _)) = votes.iter().max_by(|a, b| {
                a.1.partial_cmp(b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(a.0))
            }) else {
                continue;
            };
            let current = labels.get(*id).copied().unwrap_or(usize::MAX);
            if best != current {
                labels.insert(*id, best);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (id, label) in labels {
        groups.entry(label).or_default().push(id.clone());
    }
    let mut communities: Vec<Vec<String>> = groups
        .into_values()
        .map(|mut members| {
            members.sort();
            members
        })
        .collect();
    communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    communities
}

/// Builds the adjacency map of a projection, symmetrised when undirected.
#[must_use]
pub fn projection_adjacency(projection: &GraphProjection) -> BTreeMap<String, Vec<(String, f32)>> {
    let mut adjacency: BTreeMap<String, Vec<(String, f32)>> = BTreeMap::new();
    for node in &projection.nodes {
        adjacency.entry(node.as_str().to_string()).or_default();
    }
    for (a, b, weight) in &projection.edges {
        adjacency
            .entry(a.as_str().to_string())
            .or_default()
            .push((b.as_str().to_string(), *weight));
        adjacency
            .entry(b.as_str().to_string())
            .or_default()
            .push((a.as_str().to_string(), *weight));
    }
    adjacency
}

/// Builds a full hierarchy from a flat adjacency map.
///
/// Level 0 comes from label propagation; each coarser level contracts the
/// previous level's communities to super-nodes and re-runs propagation,
/// stopping when no community gains more than one child or `max_levels`
/// is reached. Communities below `min_community_size` are dropped at each
/// level, and a parent's member set is always the union of its children's.
#[must_use]
pub fn hierarchical_communities(
    adjacency: &BTreeMap<String, Vec<(String, f32)>>,
    options: &DetectionOptions,
) -> Vec<Community> {
    let base_partition = label_propagation(adjacency, options.max_iterations);
    let mut all: Vec<Community> = Vec::new();
    let mut current: Vec<Community> = base_partition
        .into_iter()
        .filter(|members| members.len() >= options.min_community_size)
        .enumerate()
        .map(|(i, members)| Community::new(CommunityId::for_level(0, i), 0, members))
        .collect();

    for level in 1..=options.max_levels {
        if current.len() <= 1 {
            break;
        }
        // Contract communities to super-nodes; inter-community weight is the
        // sum over member-to-member edges.
        let membership: HashMap<String, usize> = current
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.member_ids.iter().map(move |m| (m.clone(), i)))
            .collect();
        let mut super_edges: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for (node, neighbours) in adjacency {
            let Some(&from) = membership.get(node) else {
                continue;
            };
            for (neighbour, weight) in neighbours {
                let Some(&to) = membership.get(neighbour) else {
                    continue;
                };
                if from == to {
                    continue;
                }
                let key = if from < to { (from, to) } else { (to, from) };
                *super_edges.entry(key).or_insert(0.0) += weight;
            }
        }

        let mut super_adjacency: BTreeMap<String, Vec<(String, f32)>> = BTreeMap::new();
        for i in 0..current.len() {
            super_adjacency.entry(format!("s{i}")).or_default();
        }
        for ((a, b), weight) in &super_edges {
            super_adjacency
                .entry(format!("s{a}"))
                .or_default()
                .push((format!("s{b}"), *weight));
            super_adjacency
                .entry(format!("s{b}"))
                .or_default()
                .push((format!("s{a}"), *weight));
        }

        let grouped = label_propagation(&super_adjacency, options.max_iterations);
        // Converged when contraction no longer merges anything.
        if grouped.iter().all(|g| g.len() <= 1) {
            break;
        }

        let mut parents: Vec<Community> = Vec::new();
        for (i, group) in grouped.iter().enumerate() {
            let parent_id = CommunityId::for_level(level, i);
            let mut members: BTreeSet<String> = BTreeSet::new();
            let mut child_ids = Vec::new();
            for super_node in group {
                let Some(index) = super_node
                    .strip_prefix('s')
                    .and_then(|n| n.parse::<usize>().ok())
                else {
                    continue;
                };
                let child = &mut current[index];
                child.parent_id = Some(parent_id.clone());
                child_ids.push(child.id.clone());
                members.extend(child.member_ids.iter().cloned());
            }
            if members.len() < options.min_community_size {
                continue;
            }
            let mut parent =
                Community::new(parent_id, level, members.into_iter().collect());
            parent.child_ids = child_ids;
            parents.push(parent);
        }

        all.append(&mut current);
        current = parents;
    }

    all.append(&mut current);
    all
}

/// Connected-components fallback grouped by an anchor entity type.
///
/// Components containing no anchor node are still emitted; the anchor only
/// orders the output so components led by the chosen type come first.
#[must_use]
pub fn connected_components(
    projection: &GraphProjection,
    anchors: &BTreeSet<String>,
    min_community_size: usize,
) -> Vec<Community> {
    let adjacency = projection_adjacency(projection);
    let mut visited: BTreeSet<&String> = BTreeSet::new();
    let mut components: Vec<Vec<String>> = Vec::new();

    for start in adjacency.keys() {
        if visited.contains(start) {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            component.push(node.clone());
            if let Some(neighbours) = adjacency.get(node) {
                for (neighbour, _) in neighbours {
                    if let Some((key, _)) = adjacency.get_key_value(neighbour) {
                        if !visited.contains(key) {
                            stack.push(key);
                        }
                    }
                }
            }
        }
        component.sort();
        components.push(component);
    }

    components.retain(|c| c.len() >= min_community_size);
    components.sort_by(|a, b| {
        let a_anchored = a.iter().any(|m| anchors.contains(m));
        let b_anchored = b.iter().any(|m| anchors.contains(m));
        b_anchored
            .cmp(&a_anchored)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.cmp(b))
    });
    components
        .into_iter()
        .enumerate()
        .map(|(i, members)| Community::new(CommunityId::for_level(0, i), 0, members))
        .collect()
}

/// Detects communities over graph-store projections.
pub struct CommunityDetector {
    graph: Arc<dyn GraphStore>,
    options: DetectionOptions,
}

impl CommunityDetector {
    /// Creates a detector over a graph store.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>, options: DetectionOptions) -> Self {
        Self { graph, options }
    }

    /// Runs detection over a named projection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for an unknown projection.
    pub fn detect(&self, projection_name: &str) -> Result<Vec<Community>> {
        let projection = self.graph.projection(projection_name)?;
        Ok(self.detect_from_projection(&projection))
    }

    /// Runs detection over an already-materialised projection.
    #[must_use]
    pub fn detect_from_projection(&self, projection: &GraphProjection) -> Vec<Community> {
        match self.options.algorithm {
            DetectionAlgorithm::LabelPropagation => {
                let adjacency = projection_adjacency(projection);
                hierarchical_communities(&adjacency, &self.options)
            },
            DetectionAlgorithm::ConnectedComponents { anchor } => {
                let anchors: BTreeSet<String> = self
                    .graph
                    .entities_of_type(anchor)
                    .map(|entities| {
                        entities
                            .into_iter()
                            .map(|e| e.id.as_str().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                connected_components(projection, &anchors, self.options.min_community_size)
            },
        }
    }
}
