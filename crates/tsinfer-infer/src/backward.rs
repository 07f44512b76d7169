//! Backward phase: requirements on values, discovered from their uses.
//!
//! Runs over the reversed application graph. A fact `x: T` at a statement
//! says that the value `x` holds there is later used as a `T`. Reaching the
//! synthetic entry of a method (the exit of the reversed graph) the facts on
//! `this` and the arguments become the method's backward summary.

use crate::cache::AnalysisCache;
use crate::facts::{AnalyzerEvent, BackwardFact, Summary};
use crate::guards::{GuardResolver, is_reachable};
use crate::sink::DiagnosticSink;
use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::trace;
use tsinfer_common::limits::MAX_BACKWARD_TYPE_COMPLEXITY;
use tsinfer_common::{Diagnostic, DiagnosticCategory, diagnostic_codes};
use tsinfer_ifds::{AnalysisError, Analyzer, Edge, FlowFunctions, FlowResult};
use tsinfer_ir::{
    AccessPathBase, Accessor, EtsApplicationGraph, EtsType, Method, MethodId, Stmt, StmtRef,
    Value, to_path,
};
use tsinfer_solver::TypeFact;

pub struct BackwardFlowFunctions<'a> {
    graph: &'a EtsApplicationGraph<'a>,
    cache: &'a AnalysisCache,
    sink: &'a DiagnosticSink,
    /// Requirements observed on freshly allocated objects, per class.
    saved_types: DashMap<EtsType, BTreeSet<TypeFact>>,
}

impl<'a> BackwardFlowFunctions<'a> {
    pub fn new(
        graph: &'a EtsApplicationGraph<'a>,
        cache: &'a AnalysisCache,
        sink: &'a DiagnosticSink,
    ) -> Self {
        Self {
            graph,
            cache,
            sink,
            saved_types: DashMap::new(),
        }
    }

    /// Requirements collected at `x := new T`, grouped by `T`.
    pub fn saved_types(&self) -> Vec<(EtsType, Vec<TypeFact>)> {
        let mut saved: Vec<_> = self
            .saved_types
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().iter().cloned().collect()))
            .collect();
        saved.sort_by(|a, b| a.0.cmp(&b.0));
        saved
    }

    fn method(&self, stmt: StmtRef) -> &'a Method {
        self.graph.scene().method(stmt.method)
    }

    fn subject(&self, stmt: StmtRef) -> String {
        format!("{}#{}", self.method(stmt).signature, stmt.index)
    }

    /// Attach the type tests of every dominating branch that decides whether
    /// `current` runs.
    fn with_type_guards(
        &self,
        current: StmtRef,
        base: AccessPathBase,
        ty: TypeFact,
    ) -> Result<BackwardFact, AnalysisError> {
        let method = self.method(current);
        let dominators = self.cache.dominators(method);
        let resolver = GuardResolver::new(method, &dominators);
        let chain: Vec<i32> = dominators.dominators(current.index).collect();

        let mut ty = ty;
        for &branch in chain.iter().rev() {
            if !matches!(method.stmt(branch), Stmt::If { .. }) {
                continue;
            }
            let Some(guard) = resolver.resolve(branch) else {
                continue;
            };
            if guard.base != base {
                continue;
            }

            let successors = method.successors(branch);
            let [on_false, on_true] = successors.as_slice() else {
                return Err(AnalysisError::malformed_cfg(
                    format!("{}#{branch}", method.signature),
                    format!("branch with {} successors", successors.len()),
                ));
            };
            let from_true = is_reachable(method, *on_true, current.index);
            let from_false = is_reachable(method, *on_false, current.index);
            let negated = match (from_true, from_false) {
                (true, false) => guard.negated,
                (false, true) => !guard.negated,
                _ => continue,
            };

            match ty.with_guard(guard.guard.clone(), negated) {
                Ok(guarded) => ty = guarded,
                Err(conflict) => self.sink.report(Diagnostic::warning(
                    diagnostic_codes::GUARD_POLARITY_CONFLICT,
                    self.subject(current),
                    &[&conflict.guard.to_string(), &base.to_string()],
                )),
            }
        }
        Ok(BackwardFact::typed(base, ty))
    }

    fn sequent_zero(&self, current: StmtRef, stmt: &Stmt) -> FlowResult<BackwardFact> {
        let mut result = vec![BackwardFact::Zero];

        match stmt {
            // `return x`: x must hold some value.
            Stmt::Return { value: Some(value) } => {
                if let Ok(path) = to_path(value) {
                    result.push(self.with_type_guards(current, path.base, TypeFact::Unknown)?);
                }
            }
            Stmt::Assign { lhv, rhv } => {
                match rhv {
                    Value::Unary { arg, .. } => {
                        self.require_operands(current, [&**arg], &mut result)?;
                    }
                    Value::Binary { left, right, .. } => {
                        self.require_operands(current, [&**left, &**right], &mut result)?;
                    }
                    _ => {
                        if let Some(path) = path_of(rhv) {
                            let ty = match path.accesses.as_slice() {
                                // `x := y`: y is read.
                                [] => Some(TypeFact::Unknown),
                                // `x := y.f`: y has a property f.
                                [Accessor::Field { name, .. }] => Some(TypeFact::object_with(
                                    None,
                                    [(&**name, TypeFact::Unknown)],
                                )),
                                // `x := y[i]`: y is an array.
                                [Accessor::Element] => Some(TypeFact::array(TypeFact::Unknown)),
                                _ => None,
                            };
                            if let Some(ty) = ty {
                                result.push(self.with_type_guards(current, path.base, ty)?);
                            }
                        }
                    }
                }

                if let Ok(path) = to_path(lhv) {
                    match path.accesses.as_slice() {
                        // `x.f := y`: x has a property f.
                        [Accessor::Field { name, .. }] => {
                            let ty = TypeFact::object_with(None, [(&**name, TypeFact::Unknown)]);
                            result.push(self.with_type_guards(current, path.base, ty)?);
                        }
                        // `x[i] := y`: x is an array.
                        [Accessor::Element] => {
                            let ty = TypeFact::array(TypeFact::Unknown);
                            result.push(self.with_type_guards(current, path.base, ty)?);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        Ok(result)
    }

    /// Operands of an operator are read, so they hold some value.
    fn require_operands<'v>(
        &self,
        current: StmtRef,
        operands: impl IntoIterator<Item = &'v Value>,
        result: &mut Vec<BackwardFact>,
    ) -> Result<(), AnalysisError> {
        for operand in operands {
            if let Some(path) = path_of(operand).filter(|p| p.is_bare()) {
                if matches!(path.base, AccessPathBase::Const(_)) {
                    continue;
                }
                result.push(self.with_type_guards(current, path.base, TypeFact::Unknown)?);
            }
        }
        Ok(())
    }

    fn sequent_fact(
        &self,
        current: StmtRef,
        stmt: &Stmt,
        base: &AccessPathBase,
        ty: &TypeFact,
    ) -> FlowResult<BackwardFact> {
        let fact = BackwardFact::typed(base.clone(), ty.clone());
        let Stmt::Assign { lhv, rhv } = stmt else {
            return Ok(vec![fact]);
        };
        let Ok(lhv) = to_path(lhv) else {
            return Ok(vec![fact]);
        };

        let rhv = match rhv {
            Value::New { ty: allocated } => {
                // `x := new T` with `x: U` remembers U for T.
                if lhv.is_bare() && lhv.base == *base {
                    self.saved_types
                        .entry(allocated.clone())
                        .or_default()
                        .insert(ty.clone());
                }
                return Ok(vec![fact]);
            }
            other => match path_of(other) {
                Some(path) => path,
                None => return Ok(vec![fact]),
            },
        };

        if lhv.base != *base {
            return Ok(vec![fact]);
        }

        match (lhv.accesses.as_slice(), rhv.accesses.as_slice()) {
            // `x := y`: x: T requires y: T.
            ([], []) => {
                let moved = self.with_type_guards(current, rhv.base, ty.clone())?;
                Ok(vec![fact, moved])
            }
            // `x := y.f`: x: T requires y: { f: T }. A fact that already
            // describes `f` on x is not carried over.
            ([], [Accessor::Field { name, .. }]) => {
                if ty.as_object().is_some_and(|obj| obj.property(name).is_some()) {
                    return Ok(vec![fact]);
                }
                let wrapped = TypeFact::object_with(None, [(&**name, ty.clone())]);
                let moved = self.with_type_guards(current, rhv.base, wrapped)?;
                Ok(vec![fact, moved])
            }
            // `x := y[i]`: x: T requires y: Array<T>.
            ([], [Accessor::Element]) => {
                let moved =
                    self.with_type_guards(current, rhv.base, TypeFact::array(ty.clone()))?;
                Ok(vec![fact, moved])
            }
            // `x.f := y`: x: { f: T, .. } requires y: T.
            ([Accessor::Field { name, .. }], []) => match ty {
                TypeFact::Union(_) | TypeFact::Intersection(_) => {
                    self.sink.report(Diagnostic::warning(
                        diagnostic_codes::UNSUPPORTED_CONSTRUCT,
                        self.subject(current),
                        &[&format!("field write through {}", ty.to_string_limited())],
                    ));
                    Ok(vec![fact])
                }
                TypeFact::Object(obj) => {
                    let Some(property) = obj.property(name) else {
                        return Ok(vec![fact]);
                    };
                    let mut rest = (*obj.properties).clone();
                    rest.remove(&**name);
                    let remaining = BackwardFact::typed(
                        base.clone(),
                        TypeFact::object(obj.cls.clone(), rest),
                    );
                    let moved = self.with_type_guards(current, rhv.base, property.clone())?;
                    Ok(vec![remaining, moved])
                }
                _ => Ok(vec![fact]),
            },
            // `x[i] := y`: x: Array<T> requires y: T.
            ([Accessor::Element], []) => match ty {
                TypeFact::Union(_) | TypeFact::Intersection(_) => {
                    self.sink.report(Diagnostic::warning(
                        diagnostic_codes::UNSUPPORTED_CONSTRUCT,
                        self.subject(current),
                        &[&format!("element write through {}", ty.to_string_limited())],
                    ));
                    Ok(vec![fact])
                }
                TypeFact::Array(element) => {
                    let moved = self.with_type_guards(current, rhv.base, (**element).clone())?;
                    Ok(vec![fact, moved])
                }
                _ => Ok(vec![fact]),
            },
            _ => {
                self.sink.report(Diagnostic::warning(
                    diagnostic_codes::UNSUPPORTED_CONSTRUCT,
                    self.subject(current),
                    &[&format!("multi-accessor assignment {lhv} := {rhv}")],
                ));
                Ok(vec![fact])
            }
        }
    }

    fn drop_complex(&self, current: StmtRef, facts: Vec<BackwardFact>) -> Vec<BackwardFact> {
        facts
            .into_iter()
            .filter(|fact| match fact {
                BackwardFact::TypedVariable { ty, .. }
                    if ty.complexity() >= MAX_BACKWARD_TYPE_COMPLEXITY =>
                {
                    self.sink.report(Diagnostic::from_code(
                        DiagnosticCategory::Message,
                        diagnostic_codes::FACT_LIMIT_EXCEEDED,
                        self.subject(current),
                        &[&format!("{fact:?}")],
                    ));
                    false
                }
                _ => true,
            })
            .collect()
    }
}

/// Location denoted by an assignment operand; constants have none.
fn path_of(value: &Value) -> Option<tsinfer_ir::AccessPath> {
    match value {
        Value::Local(_)
        | Value::This
        | Value::Parameter { .. }
        | Value::InstanceField { .. }
        | Value::StaticField { .. }
        | Value::ArrayAccess { .. }
        | Value::Cast { .. } => to_path(value).ok(),
        _ => None,
    }
}

fn call_result_base(stmt: &Stmt) -> Option<AccessPathBase> {
    match stmt {
        Stmt::Assign { lhv, .. } => to_path(lhv).ok().map(|p| p.base),
        _ => None,
    }
}

impl FlowFunctions<MethodId, StmtRef> for BackwardFlowFunctions<'_> {
    type Fact = BackwardFact;

    fn obtain_possible_start_facts(&self, _method: MethodId) -> Vec<BackwardFact> {
        vec![BackwardFact::Zero]
    }

    fn sequent(
        &self,
        current: StmtRef,
        _next: StmtRef,
        fact: &BackwardFact,
    ) -> FlowResult<BackwardFact> {
        let stmt = self.graph.stmt(current);
        if let Stmt::Assign { lhv, rhv } = stmt {
            if let (Ok(l), Ok(r)) = (to_path(lhv), to_path(rhv)) {
                if l == r {
                    return Ok(vec![fact.clone()]);
                }
            }
        }
        let facts = match fact {
            BackwardFact::Zero => self.sequent_zero(current, stmt)?,
            BackwardFact::TypedVariable { base, ty } => {
                self.sequent_fact(current, stmt, base, ty)?
            }
        };
        Ok(self.drop_complex(current, facts))
    }

    fn call_to_return_site(
        &self,
        call: StmtRef,
        _return_site: StmtRef,
        fact: &BackwardFact,
    ) -> FlowResult<BackwardFact> {
        let stmt = self.graph.stmt(call);
        match fact {
            BackwardFact::Zero => {
                let mut result = vec![BackwardFact::Zero];
                if let Some(Value::InstanceCall {
                    instance, method, ..
                }) = stmt.call_expr()
                {
                    if let Ok(receiver) = to_path(instance) {
                        let ty = TypeFact::object_with(None, [(&*method.name, TypeFact::Function)]);
                        result.push(BackwardFact::typed(receiver.base, ty));
                    }
                }
                Ok(result)
            }
            BackwardFact::TypedVariable { base, .. } => {
                if call_result_base(stmt).as_ref() == Some(base) {
                    Ok(Vec::new())
                } else {
                    Ok(vec![fact.clone()])
                }
            }
        }
    }

    fn call_to_start(
        &self,
        call: StmtRef,
        callee_start: StmtRef,
        fact: &BackwardFact,
    ) -> FlowResult<BackwardFact> {
        let BackwardFact::TypedVariable { base, ty } = fact else {
            return Ok(vec![BackwardFact::Zero]);
        };
        if call_result_base(self.graph.stmt(call)).as_ref() != Some(base) {
            return Ok(Vec::new());
        }
        match self.graph.stmt(callee_start) {
            Stmt::Return { value: Some(value) } => Ok(to_path(value)
                .map(|path| vec![BackwardFact::typed(path.base, ty.clone())])
                .unwrap_or_default()),
            _ => Ok(Vec::new()),
        }
    }

    fn exit_to_return_site(
        &self,
        call: StmtRef,
        _return_site: StmtRef,
        _exit: StmtRef,
        fact: &BackwardFact,
    ) -> FlowResult<BackwardFact> {
        let BackwardFact::TypedVariable { base, ty } = fact else {
            return Ok(vec![BackwardFact::Zero]);
        };
        let Some(expr) = self.graph.stmt(call).call_expr() else {
            return Ok(Vec::new());
        };
        let target = match (base, expr) {
            (AccessPathBase::This, Value::InstanceCall { instance, .. }) => to_path(instance).ok(),
            (AccessPathBase::Arg(index), _) => expr
                .call_args()
                .get(*index as usize)
                .and_then(|arg| to_path(arg).ok()),
            _ => None,
        };
        Ok(target
            .map(|path| vec![BackwardFact::typed(path.base, ty.clone())])
            .unwrap_or_default())
    }
}

/// Emits a [`Summary`] for every fact reaching the synthetic entry.
pub struct BackwardAnalyzer<'a> {
    flow: BackwardFlowFunctions<'a>,
}

impl<'a> BackwardAnalyzer<'a> {
    pub fn new(flow: BackwardFlowFunctions<'a>) -> Self {
        Self { flow }
    }
}

impl<'a> Analyzer<MethodId, StmtRef> for BackwardAnalyzer<'a> {
    type Fact = BackwardFact;
    type Event = AnalyzerEvent;
    type Flow = BackwardFlowFunctions<'a>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &Edge<BackwardFact, StmtRef>) -> Vec<AnalyzerEvent> {
        if !edge.to.statement.is_synthetic_entry() {
            return Vec::new();
        }
        trace!(?edge, "backward summary");
        vec![AnalyzerEvent::Backward(Summary {
            method: edge.to.statement.method,
            initial: edge.from.clone(),
            exit: edge.to.clone(),
        })]
    }
}

#[cfg(test)]
#[path = "../tests/backward_tests.rs"]
mod tests;
