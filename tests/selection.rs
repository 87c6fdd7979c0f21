//! Property tests for weighted transition selection.

use proptest::prelude::*;
use scrimmage::Transition;

/// Normalized edge lists whose weights sum to ~1.
fn edges_strategy() -> impl Strategy<Value = Vec<Transition>> {
    prop::collection::vec(0.01f64..10.0, 1..8).prop_map(|weights| {
        let total: f64 = weights.iter().sum();
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| Transition::new(format!("s{i}"), w / total))
            .collect()
    })
}

proptest! {
    /// Whatever the roll, the chosen target is one of the declared edges.
    #[test]
    fn chosen_target_is_always_declared(edges in edges_strategy(), roll in 0.0f64..1.0) {
        let picked = Transition::choose(&edges, roll).unwrap();
        prop_assert!(edges.iter().any(|e| e.target == picked.target));
    }

    /// A roll at (or beyond) the accumulated weight lands on the last
    /// declared edge: rounding remainder is absorbed, never dropped.
    #[test]
    fn rounding_remainder_goes_to_last_declared(edges in edges_strategy()) {
        let picked = Transition::choose(&edges, 1.0).unwrap();
        prop_assert_eq!(&picked.target, &edges.last().unwrap().target);
    }

    /// Selection is monotone in the roll: a larger roll never selects an
    /// earlier-declared edge.
    #[test]
    fn selection_is_monotone(edges in edges_strategy(), a in 0.0f64..1.0, b in 0.0f64..1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let index_of = |target: &str| edges.iter().position(|e| e.target == target).unwrap();
        let lo_pick = index_of(&Transition::choose(&edges, lo).unwrap().target);
        let hi_pick = index_of(&Transition::choose(&edges, hi).unwrap().target);
        prop_assert!(lo_pick <= hi_pick);
    }
}

#[test]
fn zero_roll_selects_first_declared() {
    let edges = vec![Transition::new("a", 0.25), Transition::new("b", 0.75)];
    assert_eq!(Transition::choose(&edges, 0.0).unwrap().target, "a");
}
