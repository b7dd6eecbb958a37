use proptest::prelude::*;
use rag_deadlock::{analyze, AllocationGraph, Edge};

fn label() -> impl Strategy<Value = String> {
    (prop_oneof![Just('P'), Just('R'), Just('X')], 0u8..6).prop_map(|(p, n)| format!("{p}{n}"))
}

fn edge_list() -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::vec((label(), label()).prop_map(Edge::from), 0..24)
}

proptest! {
    #[test]
    fn analysis_is_idempotent(input in edge_list()) {
        prop_assert_eq!(analyze(&input), analyze(&input));
    }

    #[test]
    fn verdict_follows_cycle_presence(input in edge_list()) {
        let graph = AllocationGraph::from_edges(
            input.iter().map(|e| (e.source.as_str(), e.target.as_str())),
        );
        let analysis = analyze(&input);

        prop_assert_eq!(analysis.deadlock_detected, graph.has_cycle());
        prop_assert_eq!(analysis.deadlock_detected, !analysis.cycle.is_empty());
        prop_assert_eq!(analysis.conditions.circular_wait, analysis.deadlock_detected);
    }

    #[test]
    fn reported_cycle_is_closed_and_uses_input_edges(input in edge_list()) {
        let analysis = analyze(&input);
        let cycle = &analysis.cycle;

        for (i, step) in cycle.iter().enumerate() {
            let next = &cycle[(i + 1) % cycle.len()];
            prop_assert_eq!(&step.target, &next.source);
            prop_assert!(input
                .iter()
                .any(|e| e.source == step.source && e.target == step.target));
        }
    }

    #[test]
    fn requests_only_never_deadlock(
        pairs in prop::collection::vec((0u8..6, 0u8..6), 0..24)
    ) {
        let input: Vec<Edge> = pairs
            .into_iter()
            .map(|(p, r)| Edge::new(format!("P{p}"), format!("R{r}")))
            .collect();
        let analysis = analyze(&input);

        prop_assert!(!analysis.deadlock_detected);
        prop_assert!(!analysis.conditions.hold_and_wait);
    }
}
