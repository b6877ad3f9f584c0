//! Breadth-first search over the boolean lattice of subsets, walking a
//! spanning tree from the full set downwards. Only maximal consistent subsets
//! are reported: a consistent set stops the descent, and subsets of an earlier
//! result are dropped. An inconsistent set is only expanded when it is the
//! leftmost child of its parent or when its prefix below the removal point is
//! consistent, which prunes branches that cannot contain a new maximum.

use std::collections::VecDeque;

use crate::binding::Binding;

/// A maximal consistent subset together with its merged binding.
#[derive(Debug, Clone)]
pub struct Subset<T> {
    pub members: Vec<T>,
    pub binding: Binding,
}

struct Work<T> {
    members: Vec<T>,
    k: Option<T>,
    leftmost: bool,
}

fn is_subset<T: Ord>(small: &[T], large: &[T]) -> bool {
    // both sides are sorted
    let mut large = large.iter();
    small.iter().all(|s| large.any(|l| l == s))
}

/// Finds the maximal non-empty subsets of `items` for which `hard` yields a
/// valid binding. Results come out largest first, in discovery order.
pub fn maximal_consistent_subsets<T, F>(items: impl IntoIterator<Item = T>, mut hard: F) -> Vec<Subset<T>>
where
    T: Copy + Ord,
    F: FnMut(&[T]) -> Binding,
{
    let mut members: Vec<T> = items.into_iter().collect();
    members.sort();
    members.dedup();

    let mut work = VecDeque::from([Work { members, k: None, leftmost: false }]);
    let mut results: Vec<Subset<T>> = Vec::new();

    while let Some(Work { members, k, leftmost }) = work.pop_front() {
        let binding = hard(&members);
        if binding.is_valid() {
            if !members.is_empty() && !results.iter().any(|r| is_subset(&members, &r.members)) {
                results.push(Subset { members, binding });
            }
            continue;
        }
        let below_k: Vec<T> = members.iter().copied().filter(|m| k.is_some_and(|k| *m < k)).collect();
        if leftmost || hard(&below_k).is_valid() {
            let mut first = true;
            for &removed in members.iter().filter(|m| k.is_none_or(|k| k < **m)) {
                let remaining = members.iter().copied().filter(|m| *m != removed).collect();
                work.push_back(Work { members: remaining, k: Some(removed), leftmost: first });
                first = false;
            }
        }
    }
    results
}
