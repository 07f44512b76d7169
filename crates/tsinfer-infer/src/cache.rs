//! Per-method CFG analyses memoized for the lifetime of one manager.

use crate::aliases::MethodAliases;
use dashmap::DashMap;
use std::sync::Arc;
use tsinfer_ir::{Dominators, Method, MethodId, MethodLiveness};

/// Lazily computed, never evicted. Concurrent first requests may compute the
/// same entry twice; the first insert wins.
#[derive(Default)]
pub struct AnalysisCache {
    dominators: DashMap<MethodId, Arc<Dominators>>,
    liveness: DashMap<MethodId, Arc<MethodLiveness>>,
    aliases: DashMap<MethodId, Arc<MethodAliases>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dominators(&self, method: &Method) -> Arc<Dominators> {
        memoize(&self.dominators, method, Dominators::compute)
    }

    pub fn liveness(&self, method: &Method) -> Arc<MethodLiveness> {
        memoize(&self.liveness, method, MethodLiveness::compute)
    }

    pub fn aliases(&self, method: &Method) -> Arc<MethodAliases> {
        memoize(&self.aliases, method, MethodAliases::compute)
    }
}

fn memoize<T>(
    map: &DashMap<MethodId, Arc<T>>,
    method: &Method,
    compute: impl FnOnce(&Method) -> T,
) -> Arc<T> {
    if let Some(cached) = map.get(&method.id) {
        return Arc::clone(&cached);
    }
    let computed = Arc::new(compute(method));
    Arc::clone(&map.entry(method.id).or_insert(computed))
}
