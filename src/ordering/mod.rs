//! Partial-order sorting
//!
//! [`order`] sorts items under a comparator that may leave pairs unrelated.
//! Hard constraints ([`Precedence::Before`] / [`Precedence::After`]) form a
//! graph that must be acyclic; soft preferences ([`Precedence::Prefer`]) only
//! break ties between items that are free to go next. Anything left undecided
//! keeps declaration order.
//!
//! ```text
//!   hard edges         ready set          pick
//!   X ──▶ Y ──▶ Z      {X}                X
//!                      {Y}                Y
//!   W (prio -1)        {Z, W}             W  (soft preference)
//!                      {Z}                Z
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Relation between two items `a` and `b`, as seen from `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// `a` must come before `b`.
    Before,
    /// `a` must come after `b`.
    After,
    /// No constraint, but `Less` means `a` should go first when both are free.
    Prefer(Ordering),
    /// No constraint and no preference.
    Incomparable,
}

impl Precedence {
    /// Soft precedence from two sortable keys; equal keys are incomparable.
    pub fn prefer_by<K: Ord>(a: K, b: K) -> Self {
        match a.cmp(&b) {
            Ordering::Equal => Precedence::Incomparable,
            ordering => Precedence::Prefer(ordering),
        }
    }
}

/// The hard constraints contain a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderError {
    /// Indices into the input, in "must come before" order. The first index
    /// closes the loop and is not repeated.
    pub cycle: Vec<usize>,
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle through items {:?}", self.cycle)
    }
}

impl std::error::Error for OrderError {}

/// Sort `items` so every hard constraint holds.
pub fn order<T, F>(items: Vec<T>, compare: F) -> Result<Vec<T>, OrderError>
where
    F: Fn(&T, &T) -> Precedence,
{
    let permutation = order_indices(&items, compare)?;
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(permutation
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Like [`order`], but returns the permutation instead of moving the items.
pub fn order_indices<T, F>(items: &[T], compare: F) -> Result<Vec<usize>, OrderError>
where
    F: Fn(&T, &T) -> Precedence,
{
    let n = items.len();
    let mut edge = vec![vec![false; n]; n];
    let mut preferred = vec![vec![false; n]; n];

    for a in 0..n {
        for b in 0..n {
            if a == b {
                continue;
            }
            match compare(&items[a], &items[b]) {
                Precedence::Before => edge[a][b] = true,
                Precedence::After => edge[b][a] = true,
                Precedence::Prefer(Ordering::Less) => preferred[a][b] = true,
                Precedence::Prefer(Ordering::Greater) => preferred[b][a] = true,
                Precedence::Prefer(Ordering::Equal) | Precedence::Incomparable => {}
            }
        }
    }

    let mut in_degree: Vec<usize> = (0..n)
        .map(|b| (0..n).filter(|&a| edge[a][b]).count())
        .collect();
    let mut placed = vec![false; n];
    let mut sequence = Vec::with_capacity(n);

    while sequence.len() < n {
        let ready: Vec<usize> = (0..n)
            .filter(|&i| !placed[i] && in_degree[i] == 0)
            .collect();

        if ready.is_empty() {
            return Err(OrderError {
                cycle: find_cycle(&edge, &placed),
            });
        }

        let next = ready
            .iter()
            .copied()
            .find(|&candidate| !ready.iter().any(|&other| preferred[other][candidate]))
            .unwrap_or(ready[0]);

        placed[next] = true;
        sequence.push(next);
        for succ in 0..n {
            if edge[next][succ] {
                in_degree[succ] -= 1;
            }
        }
    }

    Ok(sequence)
}

/// Every unplaced node has an unplaced predecessor, so walking predecessors must loop.
fn find_cycle(edge: &[Vec<bool>], placed: &[bool]) -> Vec<usize> {
    let n = edge.len();
    let Some(start) = (0..n).find(|&i| !placed[i]) else {
        return Vec::new();
    };

    let mut position = vec![None; n];
    let mut walk = Vec::new();
    let mut current = start;

    loop {
        if let Some(at) = position[current] {
            let mut cycle: Vec<usize> = walk[at..].to_vec();
            cycle.reverse();
            return cycle;
        }
        position[current] = Some(walk.len());
        walk.push(current);

        match (0..n).find(|&pred| !placed[pred] && edge[pred][current]) {
            Some(pred) => current = pred,
            None => return walk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node {
        name: &'static str,
        after: Vec<&'static str>,
        priority: i32,
    }

    fn node(name: &'static str, after: &[&'static str], priority: i32) -> Node {
        Node {
            name,
            after: after.to_vec(),
            priority,
        }
    }

    fn compare(a: &Node, b: &Node) -> Precedence {
        if b.after.contains(&a.name) {
            Precedence::Before
        } else if a.after.contains(&b.name) {
            Precedence::After
        } else {
            Precedence::prefer_by(a.priority, b.priority)
        }
    }

    fn names(nodes: &[Node]) -> Vec<&'static str> {
        nodes.iter().map(|n| n.name).collect()
    }

    #[test]
    fn test_chain_is_ordered_for_every_permutation() {
        let x = node("x", &[], 0);
        let y = node("y", &["x"], 0);
        let z = node("z", &["y"], 0);

        let permutations = [
            vec![x.clone(), y.clone(), z.clone()],
            vec![z.clone(), y.clone(), x.clone()],
            vec![y.clone(), z.clone(), x.clone()],
            vec![z.clone(), x.clone(), y.clone()],
        ];

        for input in permutations {
            let sorted = order(input, compare).unwrap();
            assert_eq!(names(&sorted), vec!["x", "y", "z"]);
        }
    }

    #[test]
    fn test_priority_breaks_ties_and_equal_priorities_stay_stable() {
        let input = vec![
            node("a", &[], 10),
            node("b", &[], 5),
            node("c", &[], 5),
        ];
        let sorted = order(input, compare).unwrap();
        assert_eq!(names(&sorted), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_dependency_outranks_priority() {
        // b prefers to go first but needs a.
        let input = vec![node("a", &[], 10), node("b", &["a"], -10)];
        let sorted = order(input, compare).unwrap();
        assert_eq!(names(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_soft_preferences_never_report_cycles() {
        // Priorities and dependencies disagree in a loop; only hard edges count.
        let input = vec![
            node("a", &[], 10),
            node("b", &["c"], 1),
            node("c", &[], 20),
        ];
        let sorted = order(input, compare).unwrap();
        let position = |name| sorted.iter().position(|n| n.name == name).unwrap();
        assert!(position("c") < position("b"));
    }

    #[test]
    fn test_two_node_cycle() {
        let input = vec![node("p", &["q"], 0), node("q", &["p"], 0)];
        let err = order(input, compare).unwrap_err();
        let mut cycle = err.cycle.clone();
        cycle.sort();
        assert_eq!(cycle, vec![0, 1]);
    }

    #[test]
    fn test_cycle_reported_in_dependency_order() {
        let input = vec![
            node("free", &[], 0),
            node("a", &["c"], 0),
            node("b", &["a"], 0),
            node("c", &["b"], 0),
        ];
        let err = order_indices(&input, compare).unwrap_err();
        assert_eq!(err.cycle.len(), 3);
        assert!(!err.cycle.contains(&0));
        // Each element must precede the next one (wrapping).
        for (i, &from) in err.cycle.iter().enumerate() {
            let to = err.cycle[(i + 1) % err.cycle.len()];
            assert!(input[to].after.contains(&input[from].name));
        }
    }

    #[test]
    fn test_empty_input() {
        let sorted = order(Vec::<Node>::new(), compare).unwrap();
        assert!(sorted.is_empty());
    }
}
