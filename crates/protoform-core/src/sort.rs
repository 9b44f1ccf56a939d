//! Inheritance ordering.
//!
//! Depth-first topological sort over single-parent edges. Every node comes
//! after its ancestors. A parent edge that closes a cycle is cut so the
//! sort always completes; the cycle is reported to the caller.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Result of [`inheritance_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOutcome {
    /// Every node exactly once, ancestors first.
    pub order: Vec<usize>,
    /// Parent edges with cycle-closing edges removed.
    pub parents: Vec<Option<usize>>,
    /// Each detected cycle, listed from the re-entered node along the child
    /// chain. The last node's parent edge was cut.
    pub cycles: Vec<Vec<usize>>,
}

/// Order nodes `0..parents.len()` so every parent precedes its children.
/// Out-of-range parents are treated as absent.
pub fn inheritance_order(parents: &[Option<usize>]) -> SortOutcome {
    let n = parents.len();
    let mut parents: Vec<Option<usize>> = parents
        .iter()
        .map(|p| p.filter(|&p| p < n))
        .collect();
    let mut marks = vec![Mark::Unvisited; n];
    let mut order = Vec::with_capacity(n);
    let mut cycles = Vec::new();

    // Iterative: prototype chains may be thousands of records deep.
    for start in 0..n {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(node) = current {
            match marks[node] {
                Mark::Unvisited => {
                    marks[node] = Mark::OnStack;
                    path.push(node);
                    current = parents[node];
                }
                Mark::OnStack => {
                    let from = path.iter().position(|&p| p == node).unwrap_or(0);
                    let cycle: Vec<usize> = path[from..].to_vec();
                    if let Some(&last) = path.last() {
                        parents[last] = None;
                    }
                    cycles.push(cycle);
                    break;
                }
                Mark::Done => break,
            }
        }
        for &node in path.iter().rev() {
            marks[node] = Mark::Done;
            order.push(node);
        }
    }

    SortOutcome {
        order,
        parents,
        cycles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[usize], node: usize) -> usize {
        order.iter().position(|&n| n == node).unwrap()
    }

    #[test]
    fn parents_come_first() {
        // 0 <- 1 <- 2, 3 alone, 4 <- 0
        let parents = vec![Some(4), Some(0), Some(1), None, None];
        let out = inheritance_order(&parents);
        assert_eq!(out.order.len(), 5);
        assert!(out.cycles.is_empty());
        assert!(position(&out.order, 4) < position(&out.order, 0));
        assert!(position(&out.order, 0) < position(&out.order, 1));
        assert!(position(&out.order, 1) < position(&out.order, 2));
    }

    #[test]
    fn two_node_cycle_is_cut() {
        let out = inheritance_order(&[Some(1), Some(0)]);
        assert_eq!(out.cycles.len(), 1);
        assert_eq!(out.cycles[0], vec![0, 1]);
        assert_eq!(out.parents, vec![Some(1), None]);
        assert_eq!(out.order, vec![1, 0]);
    }

    #[test]
    fn self_inheritance_is_a_cycle() {
        let out = inheritance_order(&[Some(0), None]);
        assert_eq!(out.cycles, vec![vec![0]]);
        assert_eq!(out.parents[0], None);
        assert_eq!(out.order.len(), 2);
    }

    #[test]
    fn cycle_does_not_block_other_nodes() {
        // 0 <-> 1 cycle, 2 inherits 1, 3 independent
        let out = inheritance_order(&[Some(1), Some(0), Some(1), None]);
        assert_eq!(out.cycles.len(), 1);
        assert_eq!(out.order.len(), 4);
        assert!(position(&out.order, 1) < position(&out.order, 2));
    }

    #[test]
    fn out_of_range_parent_ignored() {
        let out = inheritance_order(&[Some(7)]);
        assert_eq!(out.order, vec![0]);
        assert_eq!(out.parents, vec![None]);
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let n: usize = 50_000;
        let parents: Vec<Option<usize>> = (0..n).map(|i| i.checked_sub(1)).collect();
        let out = inheritance_order(&parents);
        assert_eq!(out.order, (0..n).collect::<Vec<_>>());
    }
}
