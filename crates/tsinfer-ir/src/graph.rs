//! Interprocedural graph over a [`Scene`] and its reversed view.

use crate::model::{ClassSignature, EtsType, MethodSignature, Stmt, Value};
use crate::scene::{MethodId, Scene, StmtRef};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};
use std::sync::OnceLock;
use tracing::{debug, warn};
use tsinfer_ifds::ApplicationGraph;

type Callees = SmallVec<[MethodId; 1]>;

/// Application graph over the methods of a scene.
///
/// Callee resolution is signature based (no points-to information) and
/// memoized per call statement.
pub struct EtsApplicationGraph<'s> {
    scene: &'s Scene,
    callee_cache: DashMap<StmtRef, Callees>,
    callers_index: OnceLock<FxHashMap<MethodId, Vec<StmtRef>>>,
}

impl<'s> EtsApplicationGraph<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        Self {
            scene,
            callee_cache: DashMap::new(),
            callers_index: OnceLock::new(),
        }
    }

    pub fn scene(&self) -> &'s Scene {
        self.scene
    }

    pub fn stmt(&self, stmt: StmtRef) -> &'s Stmt {
        self.scene.stmt(stmt)
    }

    fn resolve_callees(&self, node: StmtRef) -> Callees {
        let Some(expr) = self.stmt(node).call_expr() else {
            return SmallVec::new();
        };
        let callee = match expr {
            Value::InstanceCall { method, .. } | Value::StaticCall { method, .. } => method,
            _ => return SmallVec::new(),
        };

        if callee.is_constructor() {
            return self.resolve_constructor(node, callee);
        }

        if callee.class.is_ideal() {
            let Some(class) = self.scene.resolve_class(&callee.class) else {
                return SmallVec::new();
            };
            let mut named = class
                .methods
                .iter()
                .copied()
                .filter(|&m| self.scene.method(m).name() == &*callee.name);
            return match (named.next(), named.next()) {
                (Some(m), None) => smallvec![m],
                (Some(_), Some(_)) => {
                    warn!(%callee, "multiple methods with the same complete signature");
                    SmallVec::new()
                }
                _ => SmallVec::new(),
            };
        }

        // Unique neighbour in the caller's own class, excluding recursion on
        // the caller's name.
        let caller = self.scene.method(node.method);
        let caller_class = self.scene.class(caller.class);
        let neighbours: SmallVec<[MethodId; 2]> = caller_class
            .methods
            .iter()
            .copied()
            .filter(|&m| {
                let name = self.scene.method(m).name();
                name == &*callee.name && name != caller.name()
            })
            .collect();
        match neighbours.as_slice() {
            [single] => return smallvec![*single],
            [] => {}
            _ => {
                warn!(%callee, "multiple neighbour methods with the same name");
                return SmallVec::new();
            }
        }

        // Unique partial match among the other classes.
        let candidates: SmallVec<[MethodId; 2]> = self
            .scene
            .methods()
            .iter()
            .filter(|m| m.name() == &*callee.name)
            .filter(|m| {
                let class = &self.scene.class(m.class).signature;
                class.may_equal(&callee.class) && !class.may_equal(&caller_class.signature)
            })
            .map(|m| m.id)
            .collect();
        match candidates.as_slice() {
            [single] => smallvec![*single],
            [] => {
                debug!(%callee, "unresolved call");
                SmallVec::new()
            }
            many => {
                warn!(%callee, candidates = many.len(), "multiple methods with the same partial signature");
                SmallVec::new()
            }
        }
    }

    fn resolve_constructor(&self, node: StmtRef, callee: &MethodSignature) -> Callees {
        let class_signature: ClassSignature = if callee.class.is_ideal() {
            callee.class.clone()
        } else {
            // `%0 := new T; %0.constructor(...)`: take the class from the allocation.
            let method = self.scene.method(node.method);
            let preds = method.predecessors(node.index);
            let [prev] = preds.as_slice() else {
                return SmallVec::new();
            };
            match method.stmt(*prev) {
                Stmt::Assign {
                    rhv:
                        Value::New {
                            ty: EtsType::Class { signature },
                        },
                    ..
                } => signature.clone(),
                _ => return SmallVec::new(),
            }
        };
        self.scene
            .resolve_class(&class_signature)
            .and_then(|class| self.scene.constructor_of(class.id))
            .map(|ctor| smallvec![ctor])
            .unwrap_or_default()
    }

    fn build_callers_index(&self) -> FxHashMap<MethodId, Vec<StmtRef>> {
        let mut index: FxHashMap<MethodId, Vec<StmtRef>> = FxHashMap::default();
        for method in self.scene.methods() {
            for (i, stmt) in method.stmts().iter().enumerate() {
                if stmt.call_expr().is_none() {
                    continue;
                }
                let call = StmtRef::new(method.id, i as i32);
                for callee in self.callees(call) {
                    index.entry(callee).or_default().push(call);
                }
            }
        }
        index
    }
}

impl ApplicationGraph for EtsApplicationGraph<'_> {
    type Method = MethodId;
    type Statement = StmtRef;

    fn predecessors(&self, node: StmtRef) -> SmallVec<[StmtRef; 2]> {
        self.scene
            .method(node.method)
            .predecessors(node.index)
            .into_iter()
            .map(|i| StmtRef::new(node.method, i))
            .collect()
    }

    fn successors(&self, node: StmtRef) -> SmallVec<[StmtRef; 2]> {
        self.scene
            .method(node.method)
            .successors(node.index)
            .into_iter()
            .map(|i| StmtRef::new(node.method, i))
            .collect()
    }

    fn callees(&self, node: StmtRef) -> SmallVec<[MethodId; 1]> {
        if let Some(cached) = self.callee_cache.get(&node) {
            return cached.clone();
        }
        let resolved = self.resolve_callees(node);
        self.callee_cache.insert(node, resolved.clone());
        resolved
    }

    fn callers(&self, method: MethodId) -> Vec<StmtRef> {
        self.callers_index
            .get_or_init(|| self.build_callers_index())
            .get(&method)
            .cloned()
            .unwrap_or_default()
    }

    fn entry_points(&self, method: MethodId) -> SmallVec<[StmtRef; 1]> {
        smallvec![StmtRef::entry(method)]
    }

    fn exit_points(&self, method: MethodId) -> SmallVec<[StmtRef; 2]> {
        self.scene
            .method(method)
            .exits()
            .into_iter()
            .map(|i| StmtRef::new(method, i))
            .collect()
    }

    fn method_of(&self, node: StmtRef) -> MethodId {
        node.method
    }

    fn is_call(&self, node: StmtRef) -> bool {
        self.stmt(node).call_expr().is_some()
    }
}

/// The same graph with every edge flipped: entries become exits and
/// successors become predecessors. Call resolution is unchanged.
pub struct Reversed<'g, G> {
    inner: &'g G,
}

impl<'g, G> Reversed<'g, G> {
    pub const fn new(inner: &'g G) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &'g G {
        self.inner
    }
}

impl<G: ApplicationGraph> ApplicationGraph for Reversed<'_, G> {
    type Method = G::Method;
    type Statement = G::Statement;

    fn predecessors(&self, node: Self::Statement) -> SmallVec<[Self::Statement; 2]> {
        self.inner.successors(node)
    }

    fn successors(&self, node: Self::Statement) -> SmallVec<[Self::Statement; 2]> {
        self.inner.predecessors(node)
    }

    fn callees(&self, node: Self::Statement) -> SmallVec<[Self::Method; 1]> {
        self.inner.callees(node)
    }

    fn callers(&self, method: Self::Method) -> Vec<Self::Statement> {
        self.inner.callers(method)
    }

    fn entry_points(&self, method: Self::Method) -> SmallVec<[Self::Statement; 1]> {
        self.inner.exit_points(method).into_iter().collect()
    }

    fn exit_points(&self, method: Self::Method) -> SmallVec<[Self::Statement; 2]> {
        self.inner.entry_points(method).into_iter().collect()
    }

    fn method_of(&self, node: Self::Statement) -> Self::Method {
        self.inner.method_of(node)
    }

    fn is_call(&self, node: Self::Statement) -> bool {
        self.inner.is_call(node)
    }
}

#[cfg(test)]
#[path = "../tests/graph_tests.rs"]
mod tests;
