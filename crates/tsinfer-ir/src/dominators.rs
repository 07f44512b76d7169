//! Dominator trees over a method's statement-level CFG.
//!
//! Uses the iterative algorithm of Cooper, Harvey and Kennedy ("A Simple,
//! Fast Dominance Algorithm"): immediate dominators are refined in reverse
//! postorder until nothing changes, intersecting candidates by walking up
//! the partial tree using postorder numbers.

use crate::scene::{Method, SYNTHETIC_ENTRY};
use smallvec::SmallVec;

/// Immediate dominators of every statement reachable from the synthetic entry.
#[derive(Debug, Clone)]
pub struct Dominators {
    /// Indexed by `stmt + 1`; the entry maps to itself.
    idom: Vec<Option<u32>>,
}

fn node(index: i32) -> usize {
    (index + 1) as usize
}

fn index(node: usize) -> i32 {
    node as i32 - 1
}

impl Dominators {
    pub fn compute(method: &Method) -> Self {
        let count = method.len() + 1;
        let successors = |n: usize| -> SmallVec<[usize; 2]> {
            method
                .successors(index(n))
                .into_iter()
                .map(node)
                .collect()
        };

        // Iterative DFS postorder from the entry.
        let mut postorder = Vec::with_capacity(count);
        let mut visited = vec![false; count];
        let mut stack: Vec<(usize, SmallVec<[usize; 2]>)> = Vec::new();
        let entry = node(SYNTHETIC_ENTRY);
        visited[entry] = true;
        stack.push((entry, successors(entry)));
        while let Some((n, pending)) = stack.last_mut() {
            if let Some(next) = pending.pop() {
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, successors(next)));
                }
            } else {
                postorder.push(*n);
                stack.pop();
            }
        }

        let mut order = vec![usize::MAX; count];
        for (pos, &n) in postorder.iter().enumerate() {
            order[n] = pos;
        }

        let mut idom: Vec<Option<u32>> = vec![None; count];
        idom[entry] = Some(entry as u32);

        let intersect = |idom: &[Option<u32>], mut a: usize, mut b: usize| -> usize {
            while a != b {
                while order[a] < order[b] {
                    a = idom[a].map_or(entry, |p| p as usize);
                }
                while order[b] < order[a] {
                    b = idom[b].map_or(entry, |p| p as usize);
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &b in postorder.iter().rev().filter(|&&b| b != entry) {
                let preds = method.predecessors(index(b));
                let mut processed = preds
                    .iter()
                    .map(|&p| node(p))
                    .filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let mut new_idom = first;
                for p in processed {
                    new_idom = intersect(&idom, p, new_idom);
                }
                if idom[b] != Some(new_idom as u32) {
                    idom[b] = Some(new_idom as u32);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    pub fn is_reachable(&self, stmt: i32) -> bool {
        self.idom.get(node(stmt)).is_some_and(Option::is_some)
    }

    /// Immediate dominator; `None` for the entry and unreachable statements.
    pub fn idom(&self, stmt: i32) -> Option<i32> {
        if stmt == SYNTHETIC_ENTRY {
            return None;
        }
        self.idom
            .get(node(stmt))
            .copied()
            .flatten()
            .map(|p| index(p as usize))
    }

    /// Strict dominators of `stmt`, nearest first, ending with the entry.
    pub fn dominators(&self, stmt: i32) -> impl Iterator<Item = i32> + '_ {
        std::iter::successors(self.idom(stmt), move |&d| self.idom(d))
    }

    /// Whether `a` dominates `b` (reflexive).
    pub fn dominates(&self, a: i32, b: i32) -> bool {
        (a == b && self.is_reachable(b)) || self.dominators(b).any(|d| d == a)
    }
}

#[cfg(test)]
#[path = "../tests/dominators_tests.rs"]
mod tests;
