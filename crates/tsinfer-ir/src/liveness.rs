//! Live local variables per statement.
//!
//! Classic backward may-analysis: `out(s) = ∪ in(succ)` and
//! `in(s) = use(s) ∪ (out(s) − def(s))`, iterated with a worklist until
//! stable. A local is considered alive at `s` if it is in `in(s)` or
//! `out(s)`.

use crate::model::{Name, Stmt, Value};
use crate::scene::Method;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub trait LiveVariables {
    fn is_alive_at(&self, local: &str, stmt: i32) -> bool;
}

/// Used when liveness filtering is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAlive;

impl LiveVariables for AlwaysAlive {
    fn is_alive_at(&self, _local: &str, _stmt: i32) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct MethodLiveness {
    vars: FxHashMap<Name, usize>,
    /// `in(s) ∪ out(s)` per statement, as bit rows.
    alive: Vec<Vec<u64>>,
}

fn collect_locals(value: &Value, out: &mut Vec<Name>) {
    match value {
        Value::Local(local) => out.push(local.name.clone()),
        Value::This
        | Value::Parameter { .. }
        | Value::Constant { .. }
        | Value::StaticField { .. }
        | Value::New { .. } => {}
        Value::InstanceField { instance, .. } => collect_locals(instance, out),
        Value::ArrayAccess { array, index } => {
            collect_locals(array, out);
            collect_locals(index, out);
        }
        Value::NewArray { size, .. } => collect_locals(size, out),
        Value::Cast { arg, .. } | Value::Typeof { arg } | Value::Unary { arg, .. } => {
            collect_locals(arg, out);
        }
        Value::In { property, object } => {
            collect_locals(property, out);
            collect_locals(object, out);
        }
        Value::Binary { left, right, .. } => {
            collect_locals(left, out);
            collect_locals(right, out);
        }
        Value::InstanceCall { instance, args, .. } => {
            collect_locals(instance, out);
            args.iter().for_each(|a| collect_locals(a, out));
        }
        Value::StaticCall { args, .. } => args.iter().for_each(|a| collect_locals(a, out)),
    }
}

fn uses_and_def(stmt: &Stmt) -> (Vec<Name>, Option<Name>) {
    let mut uses = Vec::new();
    let mut def = None;
    match stmt {
        Stmt::Nop => {}
        Stmt::Assign { lhv, rhv } => {
            collect_locals(rhv, &mut uses);
            match lhv {
                Value::Local(local) => def = Some(local.name.clone()),
                // Writing through `x.f` or `x[i]` reads `x`.
                other => collect_locals(other, &mut uses),
            }
        }
        Stmt::Call { expr } => collect_locals(expr, &mut uses),
        Stmt::Return { value } => {
            if let Some(v) = value {
                collect_locals(v, &mut uses);
            }
        }
        Stmt::If { condition } => collect_locals(condition, &mut uses),
        Stmt::Throw { value } => collect_locals(value, &mut uses),
    }
    (uses, def)
}

impl MethodLiveness {
    pub fn compute(method: &Method) -> Self {
        let stmts = method.stmts();
        let mut vars: FxHashMap<Name, usize> = FxHashMap::default();
        let mut info = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let (uses, def) = uses_and_def(stmt);
            for name in uses.iter().chain(def.iter()) {
                let next = vars.len();
                vars.entry(name.clone()).or_insert(next);
            }
            let uses: FxHashSet<usize> = uses.iter().map(|n| vars[n]).collect();
            let def = def.map(|n| vars[&n]);
            info.push((uses, def));
        }

        let words = vars.len().div_ceil(64).max(1);
        let empty = vec![0u64; words];
        let mut live_in = vec![empty.clone(); stmts.len()];
        let mut live_out = vec![empty; stmts.len()];

        let mut queue: VecDeque<usize> = (0..stmts.len()).rev().collect();
        let mut queued = vec![true; stmts.len()];
        while let Some(s) = queue.pop_front() {
            queued[s] = false;
            let mut out = vec![0u64; words];
            for succ in method.successors(s as i32) {
                for (o, i) in out.iter_mut().zip(&live_in[succ as usize]) {
                    *o |= *i;
                }
            }
            let (uses, def) = &info[s];
            let mut new_in = out.clone();
            if let Some(d) = def {
                new_in[d / 64] &= !(1u64 << (d % 64));
            }
            for &u in uses {
                new_in[u / 64] |= 1u64 << (u % 64);
            }
            live_out[s] = out;
            if new_in != live_in[s] {
                live_in[s] = new_in;
                for pred in method.predecessors(s as i32) {
                    if pred >= 0 && !queued[pred as usize] {
                        queued[pred as usize] = true;
                        queue.push_back(pred as usize);
                    }
                }
            }
        }

        let alive = live_in
            .into_iter()
            .zip(live_out)
            .map(|(i, o)| i.iter().zip(&o).map(|(a, b)| a | b).collect())
            .collect();
        Self { vars, alive }
    }
}

impl LiveVariables for MethodLiveness {
    /// Locals never mentioned by the method and the synthetic entry are
    /// treated as alive.
    fn is_alive_at(&self, local: &str, stmt: i32) -> bool {
        let Some(&bit) = self.vars.get(local) else {
            return true;
        };
        let Ok(index) = usize::try_from(stmt) else {
            return true;
        };
        self.alive
            .get(index)
            .is_none_or(|row| row[bit / 64] & (1u64 << (bit % 64)) != 0)
    }
}

#[cfg(test)]
#[path = "../tests/liveness_tests.rs"]
mod tests;
