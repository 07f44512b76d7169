use smallvec::SmallVec;
use std::fmt::Debug;
use std::hash::Hash;

/// Interprocedural control flow graph consumed by the runner.
///
/// Statements and methods are small copyable handles. Every method must have
/// at least one entry point without predecessors; implementations usually
/// provide a synthetic no-op entry for this.
pub trait ApplicationGraph {
    type Method: Copy + Eq + Hash + Debug;
    type Statement: Copy + Eq + Hash + Debug;

    fn predecessors(&self, node: Self::Statement) -> SmallVec<[Self::Statement; 2]>;

    fn successors(&self, node: Self::Statement) -> SmallVec<[Self::Statement; 2]>;

    /// Methods possibly invoked by `node`. Empty for non-call statements and
    /// for calls that could not be resolved.
    fn callees(&self, node: Self::Statement) -> SmallVec<[Self::Method; 1]>;

    fn callers(&self, method: Self::Method) -> Vec<Self::Statement>;

    fn entry_points(&self, method: Self::Method) -> SmallVec<[Self::Statement; 1]>;

    fn exit_points(&self, method: Self::Method) -> SmallVec<[Self::Statement; 2]>;

    fn method_of(&self, node: Self::Statement) -> Self::Method;

    /// Whether `node` contains a call expression.
    fn is_call(&self, node: Self::Statement) -> bool;

    fn is_exit(&self, node: Self::Statement) -> bool {
        self.exit_points(self.method_of(node)).contains(&node)
    }
}
