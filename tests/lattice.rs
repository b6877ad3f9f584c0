use scg::binding::Binding;
use scg::lattice::maximal_consistent_subsets;
use scg::triple::Term;

// Items conflict when both members of an excluded pair are present.
fn excluding(pairs: &'static [(usize, usize)]) -> impl FnMut(&[usize]) -> Binding {
    move |members: &[usize]| {
        let clash = pairs.iter().any(|(a, b)| members.contains(a) && members.contains(b));
        if clash { Binding::new().unify(&Term::Id(1), &Term::Id(2)) } else { Binding::new() }
    }
}

fn found(results: Vec<scg::lattice::Subset<usize>>) -> Vec<Vec<usize>> {
    let mut found: Vec<Vec<usize>> = results.into_iter().map(|r| r.members).collect();
    found.sort();
    found
}

#[test]
fn consistent_set_is_its_own_maximum() {
    let results = maximal_consistent_subsets(0..3, excluding(&[]));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].members, vec![0, 1, 2]);
}

#[test]
fn one_conflict_gives_two_maxima() {
    let results = maximal_consistent_subsets(0..3, excluding(&[(0, 2)]));
    assert_eq!(found(results), vec![vec![0, 1], vec![1, 2]]);
}

#[test]
fn pairwise_conflicts_give_singletons() {
    let results = maximal_consistent_subsets(0..3, excluding(&[(0, 1), (0, 2), (1, 2)]));
    assert_eq!(found(results), vec![vec![0], vec![1], vec![2]]);
}

#[test]
fn maxima_are_never_nested() {
    let results = maximal_consistent_subsets(0..4, excluding(&[(0, 3), (1, 3)]));
    assert_eq!(found(results), vec![vec![0, 1, 2], vec![2, 3]]);
}

#[test]
fn empty_input_has_no_results() {
    assert!(maximal_consistent_subsets(Vec::<usize>::new(), excluding(&[])).is_empty());
}
