//! Property tests for the tables and the event log.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::*;
use dpp_engine::access::{default_policy, default_roles};
use dpp_engine::lifecycle::{self, Stage, StageGraph};
use dpp_engine::{AccessPolicy, Action, Caller, EventType, Role};
use proptest::prelude::*;
use serde_json::Value;

const STAGES: [&str; 8] = [
    lifecycle::NEW,
    lifecycle::RAW_SUPPLIED,
    lifecycle::GLASS_MANUFACTURED,
    lifecycle::ASSEMBLING,
    lifecycle::CONSTRUCTION,
    lifecycle::DEMOLITION,
    lifecycle::RECYCLING,
    lifecycle::LAND_FILL,
];

const ROLES: [&str; 9] = [
    "RawMaterialSupplier",
    "GlassManufacturer",
    "Assembler",
    "ConstructionTeam",
    "DemolitionTeam",
    "GlassRecycler",
    "LandFiller",
    "ComplianceAuditor",
    "Visitor",
];

fn arb_stage() -> impl Strategy<Value = Stage> {
    (0..STAGES.len()).prop_map(|i| Stage::from(STAGES[i]))
}

fn arb_graph() -> impl Strategy<Value = BTreeMap<Stage, BTreeSet<Stage>>> {
    prop::collection::btree_map(arb_stage(), prop::collection::btree_set(arb_stage(), 0..4), 0..8)
}

fn arb_roles() -> impl Strategy<Value = BTreeSet<Role>> {
    prop::collection::btree_set((0..ROLES.len()).prop_map(|i| Role::from(ROLES[i])), 0..5)
}

fn arb_action() -> impl Strategy<Value = Action> {
    (0..Action::ALL.len()).prop_map(|i| Action::ALL[i])
}

/// One lifecycle step: who calls, what, and with which arguments.
#[derive(Debug, Clone, Copy)]
enum Step {
    Manufacture,
    Assemble,
    Construct,
    Demolish,
    Recycle,
    Landfill,
}

impl Step {
    fn call(self) -> (&'static str, &'static str) {
        match self {
            Step::Manufacture => (MANUFACTURER, "ManufactureGlass"),
            Step::Assemble => (SITE, "AssembleProduct"),
            Step::Construct => (SITE, "Construction"),
            Step::Demolish => (SITE, "Demolition"),
            Step::Recycle => (SITE, "Recycling"),
            Step::Landfill => (SITE, "LandFilling"),
        }
    }
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Manufacture),
        Just(Step::Assemble),
        Just(Step::Construct),
        Just(Step::Demolish),
        Just(Step::Recycle),
        Just(Step::Landfill),
    ]
}

proptest! {
    /// A transition is legal exactly when its edge is in the table.
    #[test]
    fn legality_matches_edges(edges in arb_graph(), from in arb_stage(), to in arb_stage()) {
        let expected = edges.get(&from).is_some_and(|t| t.contains(&to));
        let graph = StageGraph::new(edges);
        prop_assert_eq!(graph.is_legal(&from, &to), expected);
    }

    #[test]
    fn default_graph_legality(from in arb_stage(), to in arb_stage()) {
        let graph = StageGraph::default();
        let listed = graph.successors(&from).any(|s| *s == to);
        prop_assert_eq!(graph.is_legal(&from, &to), listed);
    }

    /// Holding more roles never loses a permission.
    #[test]
    fn permissions_are_monotonic(
        a in arb_roles(),
        extra in arb_roles(),
        action in arb_action(),
    ) {
        let policy = AccessPolicy::new(default_roles(), default_policy());
        let b: BTreeSet<Role> = a.union(&extra).cloned().collect();
        if policy.permits(&a, action) {
            prop_assert!(policy.permits(&b, action));
        }
    }

    #[test]
    fn open_actions_admit_anyone(roles in arb_roles()) {
        let policy = AccessPolicy::new(default_roles(), default_policy());
        prop_assert!(policy.permits(&roles, Action::GetProductStatus));
        prop_assert!(policy.permits(&roles, Action::GetHistory));
        prop_assert!(policy.authorize(&Caller::new("Org42MSP"), Action::GetHistory).is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever sequence of calls is attempted, the committed log stays
    /// contiguous and the current stage is the one the last event reached.
    #[test]
    fn random_walk_keeps_log_consistent(steps in prop::collection::vec(arb_step(), 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let record: Value = rt.block_on(async {
            let svc = service();
            with_raw_material(&svc, "P-1").await;
            for (i, step) in steps.iter().enumerate() {
                let (msp, function) = step.call();
                let hash = format!("doc-{i}");
                if let Err(e) = svc
                    .submit(&Caller::new(msp), function, &args(&["P-1", hash.as_str(), "ipfs://doc"]))
                    .await
                {
                    assert_eq!(e.kind(), "IllegalTransition", "{function}: {e}");
                }
            }
            serde_json::from_slice(&stored(&svc, "P-1").await.unwrap()).unwrap()
        });

        let events = record["events"].as_array().unwrap();
        for (i, event) in events.iter().enumerate() {
            prop_assert_eq!(event["seq"].as_u64(), Some(i as u64 + 1));
        }
        let last: EventType = events
            .last()
            .and_then(|e| e["type"].as_str())
            .unwrap()
            .parse()
            .unwrap();
        let reached = last.target_stage();
        prop_assert_eq!(record["currentStage"].as_str(), Some(reached.as_str()));
    }
}
