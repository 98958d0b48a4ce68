//! Lifecycle state machine.
//!
//! Stages are opaque names so a deployment can extend the graph. The graph is
//! a plain adjacency table: a stage with no entry is terminal.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const NEW: &str = "NEW";
pub const RAW_SUPPLIED: &str = "RawSupplied";
pub const GLASS_MANUFACTURED: &str = "GlassManufactured";
pub const ASSEMBLING: &str = "Assembling";
pub const CONSTRUCTION: &str = "Construction";
pub const DEMOLITION: &str = "Demolition";
pub const RECYCLING: &str = "Recycling";
pub const LAND_FILL: &str = "LandFill";

/// A lifecycle position such as `RawSupplied`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(String);

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Stage(name.into())
    }

    /// The stage of a freshly created product.
    pub fn initial() -> Self {
        Stage::new(NEW)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Stage {
    fn from(name: &str) -> Self {
        Stage::new(name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directed graph of legal stage transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageGraph {
    edges: BTreeMap<Stage, BTreeSet<Stage>>,
}

impl StageGraph {
    pub fn new(edges: BTreeMap<Stage, BTreeSet<Stage>>) -> Self {
        StageGraph { edges }
    }

    /// Whether `to` is directly reachable from `from`.
    pub fn is_legal(&self, from: &Stage, to: &Stage) -> bool {
        self.edges
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Direct successors of a stage; empty for terminal or unknown stages.
    pub fn successors(&self, stage: &Stage) -> impl Iterator<Item = &Stage> {
        self.edges.get(stage).into_iter().flatten()
    }

    /// Every stage named anywhere in the table.
    pub fn stages(&self) -> BTreeSet<&Stage> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| std::iter::once(from).chain(targets))
            .collect()
    }

    /// Stages reachable from `start` by one or more transitions.
    pub fn reachable_from(&self, start: &Stage) -> BTreeSet<&Stage> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&Stage> = self.successors(start).collect();
        while let Some(stage) = queue.pop_front() {
            if seen.insert(stage) {
                queue.extend(self.successors(stage));
            }
        }
        seen
    }

    pub fn edges(&self) -> &BTreeMap<Stage, BTreeSet<Stage>> {
        &self.edges
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        let table: [(&str, &[&str]); 7] = [
            (NEW, &[RAW_SUPPLIED]),
            (RAW_SUPPLIED, &[GLASS_MANUFACTURED]),
            (GLASS_MANUFACTURED, &[GLASS_MANUFACTURED, ASSEMBLING]),
            (ASSEMBLING, &[GLASS_MANUFACTURED, CONSTRUCTION]),
            (CONSTRUCTION, &[DEMOLITION]),
            (DEMOLITION, &[CONSTRUCTION, RECYCLING, LAND_FILL]),
            (RECYCLING, &[GLASS_MANUFACTURED]),
        ];
        StageGraph::new(
            table
                .into_iter()
                .map(|(from, to)| {
                    (
                        Stage::from(from),
                        to.iter().copied().map(Stage::from).collect(),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal(from: &str, to: &str) -> bool {
        StageGraph::default().is_legal(&Stage::from(from), &Stage::from(to))
    }

    #[test]
    fn mainline_is_legal() {
        assert!(legal(NEW, RAW_SUPPLIED));
        assert!(legal(RAW_SUPPLIED, GLASS_MANUFACTURED));
        assert!(legal(GLASS_MANUFACTURED, ASSEMBLING));
        assert!(legal(ASSEMBLING, CONSTRUCTION));
        assert!(legal(CONSTRUCTION, DEMOLITION));
        assert!(legal(DEMOLITION, LAND_FILL));
    }

    #[test]
    fn skipping_stages_is_illegal() {
        assert!(!legal(NEW, GLASS_MANUFACTURED));
        assert!(!legal(RAW_SUPPLIED, ASSEMBLING));
        assert!(!legal(CONSTRUCTION, RECYCLING));
    }

    #[test]
    fn landfill_is_terminal() {
        let graph = StageGraph::default();
        assert_eq!(graph.successors(&Stage::from(LAND_FILL)).count(), 0);
        assert!(!legal(LAND_FILL, RECYCLING));
    }

    #[test]
    fn unknown_stage_has_no_successors() {
        assert!(!legal("Limbo", NEW));
        assert!(StageGraph::default()
            .reachable_from(&Stage::from("Limbo"))
            .is_empty());
    }

    #[test]
    fn every_stage_reachable_from_new() {
        let graph = StageGraph::default();
        let reachable = graph.reachable_from(&Stage::initial());
        for stage in graph.stages() {
            if stage.as_str() != NEW {
                assert!(reachable.contains(stage), "{stage} unreachable");
            }
        }
    }

    #[test]
    fn recycling_loop_reaches_itself() {
        let graph = StageGraph::default();
        let recycling = Stage::from(RECYCLING);
        assert!(graph.reachable_from(&recycling).contains(&recycling));
    }
}
