//! Recognition of runtime type tests in branch conditions.
//!
//! Two shapes are understood:
//!
//! - `typeof` tags: `if (t == "number")` where `t := typeof x`, with the
//!   constant on either side; `!=` and `!==` flip the polarity
//! - property tests: `if (c == 0)` or `if (c)` where `c := "name" in obj`
//!
//! Operands are traced back through local copies along the chain of
//! immediate dominators that are also direct predecessors, so a definition
//! reaching the branch over several paths is not followed.

use tsinfer_ir::{AccessPathBase, Constant, Dominators, Method, Stmt, Value, to_path};
use tsinfer_solver::TypeFact;

/// `base` is known to satisfy `guard` on the true side of a branch (or not
/// to, when `negated`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeGuard {
    pub base: AccessPathBase,
    pub guard: TypeFact,
    pub negated: bool,
}

pub struct GuardResolver<'a> {
    method: &'a Method,
    dominators: &'a Dominators,
}

impl<'a> GuardResolver<'a> {
    pub fn new(method: &'a Method, dominators: &'a Dominators) -> Self {
        Self { method, dominators }
    }

    /// The type test performed by the branch at `branch`, if any.
    pub fn resolve(&self, branch: i32) -> Option<TypeGuard> {
        let Stmt::If { condition } = self.method.stmt(branch) else {
            return None;
        };
        self.resolve_condition(condition, branch)
    }

    fn resolve_condition(&self, condition: &Value, at: i32) -> Option<TypeGuard> {
        match condition {
            Value::Binary { op, left, right } if op.is_equality() || op.is_inequality() => {
                let flip = op.is_inequality();
                if is_zero(right) {
                    return self.resolve_value(left, at).map(|g| g.flipped(flip));
                }
                let (tag, tested) = match (&**left, &**right) {
                    (_, Value::Constant { value: Constant::String(tag) }) => (tag, &**left),
                    (Value::Constant { value: Constant::String(tag) }, _) => (tag, &**right),
                    _ => return None,
                };
                let guard = typeof_tag(tag)?;
                let base = self.resolve_typeof(tested, at)?;
                Some(TypeGuard {
                    base,
                    guard,
                    negated: flip,
                })
            }
            Value::Local(_) => self.resolve_value(condition, at),
            _ => None,
        }
    }

    /// Follow the definition of `value` reaching `at`.
    fn resolve_value(&self, value: &Value, at: i32) -> Option<TypeGuard> {
        let (index, rhv) = self.find_assignment(value, at)?;
        match rhv {
            Value::Local(_) | Value::InstanceField { .. } | Value::StaticField { .. } => {
                self.resolve_value(rhv, index)
            }
            Value::In { property, object } => {
                let Value::Constant {
                    value: Constant::String(name),
                } = &**property
                else {
                    return None;
                };
                let base = to_path(object).ok()?.base;
                Some(TypeGuard {
                    base,
                    guard: TypeFact::object_with(None, [(&**name, TypeFact::Unknown)]),
                    negated: false,
                })
            }
            Value::Binary { op, .. } if op.is_equality() || op.is_inequality() => {
                self.resolve_condition(rhv, index)
            }
            _ => None,
        }
    }

    fn resolve_typeof(&self, value: &Value, at: i32) -> Option<AccessPathBase> {
        if let Value::Typeof { arg } = value {
            return to_path(arg).ok().map(|p| p.base);
        }
        let (index, rhv) = self.find_assignment(value, at)?;
        match rhv {
            Value::Typeof { arg } => to_path(arg).ok().map(|p| p.base),
            Value::Local(_) => self.resolve_typeof(rhv, index),
            _ => None,
        }
    }

    /// Nearest assignment to `value` on the straight-line dominator chain
    /// ending right before `at`.
    fn find_assignment(&self, value: &Value, at: i32) -> Option<(i32, &'a Value)> {
        let target = to_path(value).ok()?;
        let mut current = at;
        loop {
            let idom = self.dominators.idom(current)?;
            if !self.method.predecessors(current).contains(&idom) {
                return None;
            }
            if let Stmt::Assign { lhv, rhv } = self.method.stmt(idom) {
                if to_path(lhv).is_ok_and(|path| path == target) {
                    return Some((idom, rhv));
                }
            }
            current = idom;
        }
    }
}

impl TypeGuard {
    fn flipped(self, flip: bool) -> Self {
        Self {
            negated: self.negated != flip,
            ..self
        }
    }
}

fn is_zero(value: &Value) -> bool {
    matches!(value, Value::Constant { value: Constant::Number(n) } if n.0 == 0.0)
}

/// Basic type denoted by a `typeof` result.
pub fn typeof_tag(tag: &str) -> Option<TypeFact> {
    match tag {
        "number" => Some(TypeFact::Number),
        "string" => Some(TypeFact::String),
        "boolean" => Some(TypeFact::Boolean),
        "function" => Some(TypeFact::Function),
        "undefined" => Some(TypeFact::Undefined),
        _ => None,
    }
}

/// Whether `to` can be reached from `from` along CFG edges (`from` itself
/// included).
pub fn is_reachable(method: &Method, from: i32, to: i32) -> bool {
    let mut visited = vec![false; method.len()];
    let mut stack = vec![from];
    while let Some(stmt) = stack.pop() {
        if stmt == to {
            return true;
        }
        let Some(seen) = usize::try_from(stmt).ok().and_then(|i| visited.get_mut(i)) else {
            continue;
        };
        if std::mem::replace(seen, true) {
            continue;
        }
        stack.extend(method.successors(stmt));
    }
    false
}

#[cfg(test)]
#[path = "../tests/guards_tests.rs"]
mod tests;
