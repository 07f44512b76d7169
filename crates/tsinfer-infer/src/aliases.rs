//! Intraprocedural must-alias analysis over allocation sites.
//!
//! Every local (and `this`, the arguments and the static base) is bound to
//! the abstract allocation it holds, and every allocation maps its fields to
//! allocations in turn. Bindings that disagree at a control flow merge
//! collapse to [`Node::Multiple`]. Two paths must-alias at a statement when
//! they trace to the same concrete allocation there.
//!
//! Element accessors are not tracked: any path through `[*]` traces to an
//! unknown allocation.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::trace;
use tsinfer_common::limits::MAX_ACCESS_PATH_LENGTH;
use tsinfer_ir::{AccessPath, AccessPathBase, Accessor, Method, Stmt, Value, to_path};

/// Abstract allocation sites. Statement-bound kinds carry the statement index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Allocation {
    New(i32),
    CallResult(i32),
    Arg(u32),
    This,
    /// A value first read from a field nobody wrote in this method.
    Imm(i32),
    /// The result of a computation with no identity (constants, operators).
    Expr(i32),
    Static,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Node {
    Alloc(u32),
    Multiple,
}

impl Node {
    fn merge(self, other: Node) -> Node {
        if self == other { self } else { Node::Multiple }
    }
}

/// Bindings holding before (or after) one statement. A missing key is
/// "not processed yet" and yields to the other side on merge.
#[derive(Clone, Debug, Default, PartialEq)]
struct AliasState {
    base_to_alloc: FxHashMap<AccessPathBase, Node>,
    fields: FxHashMap<(u32, Accessor), Node>,
}

impl AliasState {
    fn merge_from(&mut self, other: &AliasState) {
        for (base, &node) in &other.base_to_alloc {
            self.base_to_alloc
                .entry(base.clone())
                .and_modify(|n| *n = n.merge(node))
                .or_insert(node);
        }
        for (key, &node) in &other.fields {
            self.fields
                .entry(key.clone())
                .and_modify(|n| *n = n.merge(node))
                .or_insert(node);
        }
    }

    fn trace(&self, path: &AccessPath) -> Option<Node> {
        let mut node = *self.base_to_alloc.get(&path.base)?;
        for accessor in &path.accesses {
            let Node::Alloc(alloc) = node else {
                return Some(Node::Multiple);
            };
            if matches!(accessor, Accessor::Element) {
                return Some(Node::Multiple);
            }
            node = *self.fields.get(&(alloc, accessor.clone()))?;
        }
        Some(node)
    }

    fn assign(&mut self, lhv: &AccessPath, node: Node) {
        let Some((last, prefix)) = lhv.accesses.split_last() else {
            self.base_to_alloc.insert(lhv.base.clone(), node);
            return;
        };
        if matches!(last, Accessor::Element) {
            return;
        }
        let parent = AccessPath::new(lhv.base.clone(), prefix.iter().cloned());
        if let Some(Node::Alloc(alloc)) = self.trace(&parent) {
            self.fields.insert((alloc, last.clone()), node);
        }
    }
}

#[derive(Clone, Copy)]
enum Link<'a> {
    Base(&'a AccessPathBase),
    Field(u32, &'a Accessor),
}

/// Must-alias facts of one method, per statement.
#[derive(Debug)]
pub struct MethodAliases {
    allocations: Vec<Allocation>,
    /// State before each statement, indexed by statement.
    pre: Vec<AliasState>,
}

impl MethodAliases {
    pub fn compute(method: &Method) -> Self {
        let mut builder = Builder {
            allocations: Vec::new(),
            interned: FxHashMap::default(),
        };

        let mut initial = AliasState::default();
        let this = builder.intern(Allocation::This);
        initial.base_to_alloc.insert(AccessPathBase::This, Node::Alloc(this));
        let statics = builder.intern(Allocation::Static);
        initial
            .base_to_alloc
            .insert(AccessPathBase::Static, Node::Alloc(statics));
        for index in 0..method.parameters.len() as u32 {
            let arg = builder.intern(Allocation::Arg(index));
            initial
                .base_to_alloc
                .insert(AccessPathBase::Arg(index), Node::Alloc(arg));
        }

        let len = method.len();
        let mut pre: Vec<AliasState> = vec![AliasState::default(); len];
        let mut post: Vec<Option<AliasState>> = vec![None; len];

        for index in reverse_postorder(method) {
            let mut state = AliasState::default();
            let mut seeded = false;
            for pred in method.predecessors(index) {
                let incoming = if pred < 0 {
                    Some(&initial)
                } else {
                    post[pred as usize].as_ref()
                };
                if let Some(incoming) = incoming {
                    state.merge_from(incoming);
                    seeded = true;
                }
            }
            if !seeded {
                state = initial.clone();
            }
            let mut after = state.clone();
            builder.apply(index, method.stmt(index), &mut after);
            pre[index as usize] = state;
            post[index as usize] = Some(after);
        }

        trace!(
            method = %method.signature,
            allocations = builder.allocations.len(),
            "alias analysis finished"
        );
        Self {
            allocations: builder.allocations,
            pre,
        }
    }

    /// Allocation `path` must hold right before `stmt`, if it is unique.
    pub fn allocation_of(&self, stmt: i32, path: &AccessPath) -> Option<Allocation> {
        match self.state(stmt)?.trace(path)? {
            Node::Alloc(id) => self.allocations.get(id as usize).copied(),
            Node::Multiple => None,
        }
    }

    /// Every path that must hold the same object as `path` right before
    /// `stmt`, `path` itself included.
    pub fn aliases_of(&self, stmt: i32, path: &AccessPath) -> Vec<AccessPath> {
        let Some(state) = self.state(stmt) else {
            return vec![path.clone()];
        };
        let Some(Node::Alloc(target)) = state.trace(path) else {
            return vec![path.clone()];
        };

        let mut incoming: FxHashMap<u32, SmallVec<[Link<'_>; 2]>> = FxHashMap::default();
        for (base, node) in &state.base_to_alloc {
            if let Node::Alloc(alloc) = node {
                incoming.entry(*alloc).or_default().push(Link::Base(base));
            }
        }
        for ((from, accessor), node) in &state.fields {
            if let Node::Alloc(alloc) = node {
                incoming
                    .entry(*alloc)
                    .or_default()
                    .push(Link::Field(*from, accessor));
            }
        }

        let mut visiting = FxHashSet::default();
        let mut result = paths_to(target, &incoming, &mut visiting, 0);
        if !result.contains(path) {
            result.push(path.clone());
        }
        result.sort();
        result.dedup();
        result
    }

    fn state(&self, stmt: i32) -> Option<&AliasState> {
        usize::try_from(stmt).ok().and_then(|i| self.pre.get(i))
    }
}

fn paths_to(
    alloc: u32,
    incoming: &FxHashMap<u32, SmallVec<[Link<'_>; 2]>>,
    visiting: &mut FxHashSet<u32>,
    depth: usize,
) -> Vec<AccessPath> {
    if depth > MAX_ACCESS_PATH_LENGTH || !visiting.insert(alloc) {
        return Vec::new();
    }
    let mut paths = Vec::new();
    for edge in incoming.get(&alloc).into_iter().flatten() {
        match *edge {
            Link::Base(base) => paths.push(AccessPath::from_base(base.clone())),
            Link::Field(from, accessor) => {
                for prefix in paths_to(from, incoming, visiting, depth + 1) {
                    paths.push(prefix + accessor.clone());
                }
            }
        }
    }
    visiting.remove(&alloc);
    paths
}

struct Builder {
    allocations: Vec<Allocation>,
    interned: FxHashMap<Allocation, u32>,
}

impl Builder {
    fn intern(&mut self, allocation: Allocation) -> u32 {
        if let Some(&id) = self.interned.get(&allocation) {
            return id;
        }
        let id = self.allocations.len() as u32;
        self.allocations.push(allocation);
        self.interned.insert(allocation, id);
        id
    }

    fn apply(&mut self, index: i32, stmt: &Stmt, state: &mut AliasState) {
        let Stmt::Assign { lhv, rhv } = stmt else {
            return;
        };
        let Ok(lhv) = to_path(lhv) else {
            return;
        };
        let node = match rhv {
            Value::Parameter { index: arg } => Node::Alloc(self.intern(Allocation::Arg(*arg))),
            Value::This => Node::Alloc(self.intern(Allocation::This)),
            Value::Local(_)
            | Value::Cast { .. }
            | Value::InstanceField { .. }
            | Value::StaticField { .. } => match to_path(rhv) {
                Ok(source) => match state.trace(&source) {
                    Some(node) => node,
                    None => {
                        // First read of a location nothing was stored to.
                        let node = Node::Alloc(self.intern(Allocation::Imm(index)));
                        state.assign(&source, node);
                        node
                    }
                },
                Err(_) => Node::Alloc(self.intern(Allocation::Expr(index))),
            },
            Value::Constant { .. }
            | Value::Unary { .. }
            | Value::Binary { .. }
            | Value::Typeof { .. }
            | Value::In { .. }
            | Value::ArrayAccess { .. } => Node::Alloc(self.intern(Allocation::Expr(index))),
            Value::InstanceCall { .. } | Value::StaticCall { .. } => {
                Node::Alloc(self.intern(Allocation::CallResult(index)))
            }
            Value::New { .. } | Value::NewArray { .. } => {
                Node::Alloc(self.intern(Allocation::New(index)))
            }
        };
        state.assign(&lhv, node);
    }
}

/// Reachable statements in reverse postorder from statement 0.
fn reverse_postorder(method: &Method) -> Vec<i32> {
    if method.is_empty() {
        return Vec::new();
    }
    let mut visited = vec![false; method.len()];
    let mut order = Vec::with_capacity(method.len());
    let mut stack: Vec<(i32, usize)> = vec![(0, 0)];
    visited[0] = true;
    while let Some((node, next_child)) = stack.last_mut() {
        let successors = method.successors(*node);
        if let Some(&succ) = successors.get(*next_child) {
            *next_child += 1;
            if let Some(seen) = visited.get_mut(succ as usize) {
                if !*seen {
                    *seen = true;
                    stack.push((succ, 0));
                }
            }
        } else {
            order.push(*node);
            stack.pop();
        }
    }
    order.reverse();
    order
}

#[cfg(test)]
#[path = "../tests/aliases_tests.rs"]
mod tests;
