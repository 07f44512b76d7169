//! Forward phase: types values actually carry, seeded from the backward
//! scheme and from allocations and constants met along the way.

use crate::cache::AnalysisCache;
use crate::facts::{AnalyzerEvent, ForwardFact, Summary};
use crate::options::InferenceOptions;
use crate::result::MethodTypeScheme;
use crate::sink::DiagnosticSink;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use tsinfer_common::limits::{MAX_ACCESS_PATH_LENGTH, MAX_DUPLICATE_FIELDS};
use tsinfer_common::{Diagnostic, DiagnosticCategory, diagnostic_codes};
use tsinfer_ifds::{AnalysisError, Analyzer, ApplicationGraph, Edge, FlowFunctions, FlowResult};
use tsinfer_ir::{
    AccessPath, AccessPathBase, Accessor, BinaryOp, Constant, EtsApplicationGraph, EtsType,
    LiveVariables, Method, MethodId, Name, Stmt, StmtRef, UnaryOp, Value, to_path,
};
use tsinfer_solver::{Properties, TypeFact, TypeFactProcessor};

pub struct ForwardFlowFunctions<'a> {
    graph: &'a EtsApplicationGraph<'a>,
    options: &'a InferenceOptions,
    scheme: &'a FxHashMap<MethodId, MethodTypeScheme>,
    type_info: &'a FxHashMap<EtsType, TypeFact>,
    cache: &'a AnalysisCache,
    sink: &'a DiagnosticSink,
}

impl<'a> ForwardFlowFunctions<'a> {
    pub fn new(
        graph: &'a EtsApplicationGraph<'a>,
        options: &'a InferenceOptions,
        scheme: &'a FxHashMap<MethodId, MethodTypeScheme>,
        type_info: &'a FxHashMap<EtsType, TypeFact>,
        cache: &'a AnalysisCache,
        sink: &'a DiagnosticSink,
    ) -> Self {
        Self {
            graph,
            options,
            scheme,
            type_info,
            cache,
            sink,
        }
    }

    fn method(&self, stmt: StmtRef) -> &'a Method {
        self.graph.scene().method(stmt.method)
    }

    /// Type of a fresh `new T`.
    fn allocated_type(&self, ty: &EtsType) -> TypeFact {
        if let Some(known) = self.type_info.get(ty) {
            return known.clone();
        }
        let declared = ty
            .class_signature()
            .and_then(|signature| self.graph.scene().resolve_class(signature))
            .map(|class| {
                class
                    .fields
                    .iter()
                    .filter(|field| !field.is_static)
                    .map(|field| (field.name.clone(), TypeFact::from_ets_type(&field.ty)))
                    .collect::<Properties>()
            })
            .unwrap_or_default();
        TypeFact::object(Some(ty.clone()), declared)
    }

    /// Record `lhv: ty`, and `z.f: ty` for every must-alias `z` of `x` when
    /// `lhv` is `x.f`.
    fn add_with_aliases(
        &self,
        current: StmtRef,
        lhv: &AccessPath,
        ty: TypeFact,
        out: &mut Vec<ForwardFact>,
    ) {
        if self.options.alias_analysis && lhv.len() == 1 {
            let base = AccessPath::from_base(lhv.base.clone());
            let aliases = self.cache.aliases(self.method(current));
            for alias in aliases.aliases_of(current.index, &base) {
                if alias != base {
                    out.push(ForwardFact::typed(
                        &alias + lhv.accesses.as_slice(),
                        ty.clone(),
                    ));
                }
            }
        }
        out.push(ForwardFact::typed(lhv.clone(), ty));
    }

    fn sequent_zero(&self, current: StmtRef, stmt: &Stmt) -> Vec<ForwardFact> {
        let mut result = vec![ForwardFact::Zero];
        let Stmt::Assign { lhv, rhv } = stmt else {
            return result;
        };
        let Ok(lhv) = to_path(lhv) else {
            return result;
        };

        let ty = match rhv {
            Value::New { ty } => self.allocated_type(ty),
            Value::NewArray { element, .. } => {
                let element = TypeFact::from_ets_type(element);
                result.push(ForwardFact::typed(
                    lhv.clone(),
                    TypeFact::array(element.clone()),
                ));
                result.push(ForwardFact::typed(lhv + Accessor::Element, element));
                return result;
            }
            Value::Constant { value } => match value {
                Constant::String(_) => TypeFact::String,
                Constant::Number(_) => TypeFact::Number,
                Constant::Boolean(_) => TypeFact::Boolean,
                Constant::Null => TypeFact::Null,
                Constant::Undefined => TypeFact::Undefined,
            },
            Value::InstanceField { field, .. } | Value::StaticField { field }
                if self.options.add_known_types && is_known(&field.ty) =>
            {
                TypeFact::from_ets_type(&field.ty)
            }
            Value::Binary { op, .. } if op.is_arithmetic() => {
                if *op == BinaryOp::Add {
                    result.push(ForwardFact::typed(lhv.clone(), TypeFact::String));
                }
                TypeFact::Number
            }
            Value::Binary { op, .. } if op.is_relation() => TypeFact::Boolean,
            Value::Typeof { .. } => TypeFact::String,
            Value::In { .. } => TypeFact::Boolean,
            Value::Unary { op, .. } => match op {
                UnaryOp::Neg | UnaryOp::BitNot => TypeFact::Number,
                UnaryOp::Not => TypeFact::Boolean,
            },
            _ => return result,
        };
        self.add_with_aliases(current, &lhv, ty, &mut result);
        result
    }

    fn sequent_fact(
        &self,
        current: StmtRef,
        stmt: &Stmt,
        path: &AccessPath,
        ty: &TypeFact,
    ) -> Vec<ForwardFact> {
        let fact = ForwardFact::typed(path.clone(), ty.clone());
        let Stmt::Assign { lhv, rhv: rhv_value } = stmt else {
            return vec![fact];
        };
        let Ok(lhv) = to_path(lhv) else {
            return vec![fact];
        };
        let x = AccessPath::from_base(lhv.base.clone());

        let Some(rhv) = source_path(rhv_value) else {
            match lhv.accesses.as_slice() {
                // x := c overwrites everything below x.
                [] if path.starts_with(&lhv) => return Vec::new(),
                // x.f := c overwrites x.f and the same field of every alias.
                [field @ Accessor::Field { .. }] => {
                    if path.starts_with(&lhv) {
                        return Vec::new();
                    }
                    if self
                        .aliases_of(current, &x)
                        .iter()
                        .any(|z| path.starts_with(&(z + field.clone())))
                    {
                        return Vec::new();
                    }
                }
                _ => {}
            }
            return vec![fact];
        };

        match (lhv.accesses.as_slice(), rhv.accesses.as_slice()) {
            // x := y
            ([], []) => {
                if path.starts_with(&lhv) {
                    return Vec::new();
                }
                let Some(tail) = path.suffix_after(&rhv) else {
                    return vec![fact];
                };
                let moved_ty = match rhv_value {
                    Value::Cast { ty: cast, .. } if tail.is_empty() => {
                        let target = TypeFact::from_ets_type(cast);
                        TypeFactProcessor::new(self.graph.scene())
                            .intersect(ty, &target)
                            .unwrap_or_else(|| ty.clone())
                    }
                    _ => ty.clone(),
                };
                let moved = AccessPath::new(lhv.base.clone(), tail.iter().cloned());
                vec![fact, ForwardFact::typed(moved, moved_ty)]
            }
            // x := y.f, x := y[i]
            ([], [_]) => {
                if path.starts_with(&lhv) {
                    return Vec::new();
                }
                match path.suffix_after(&rhv) {
                    Some(tail) => {
                        let moved = &lhv + tail;
                        vec![fact, ForwardFact::typed(moved, ty.clone())]
                    }
                    None => vec![fact],
                }
            }
            // x.f := y
            ([field @ Accessor::Field { .. }], []) => {
                if path.starts_with(&lhv) {
                    return Vec::new();
                }
                let aliases = self.aliases_of(current, &x);
                if aliases
                    .iter()
                    .any(|z| path.starts_with(&(z + field.clone())))
                {
                    return Vec::new();
                }
                if path.base == lhv.base {
                    return vec![fact];
                }
                let Some(tail) = path.suffix_after(&rhv) else {
                    return vec![fact];
                };
                let mut result = vec![fact.clone(), ForwardFact::typed(&lhv + tail, ty.clone())];
                for z in aliases.iter().filter(|z| **z != x) {
                    let aliased = &(z + field.clone()) + tail;
                    result.push(ForwardFact::typed(aliased, ty.clone()));
                }
                result
            }
            // x[i] := y
            ([Accessor::Element], []) => match path.suffix_after(&rhv) {
                Some(tail) => vec![fact, ForwardFact::typed(&lhv + tail, ty.clone())],
                None => vec![fact],
            },
            _ => {
                self.sink.report(Diagnostic::warning(
                    diagnostic_codes::UNSUPPORTED_CONSTRUCT,
                    format!("{}#{}", self.method(current).signature, current.index),
                    &[&format!("multi-accessor assignment {lhv} := {rhv}")],
                ));
                vec![fact]
            }
        }
    }

    fn aliases_of(&self, current: StmtRef, path: &AccessPath) -> Vec<AccessPath> {
        if !self.options.alias_analysis {
            return vec![path.clone()];
        }
        self.cache
            .aliases(self.method(current))
            .aliases_of(current.index, path)
    }

    /// Drop facts whose path grew too long or loops over one field, and
    /// facts on locals that are dead at `current`.
    fn filter(&self, current: StmtRef, facts: Vec<ForwardFact>) -> Vec<ForwardFact> {
        let liveness = self
            .options
            .live_variables
            .then(|| self.cache.liveness(self.method(current)));
        facts
            .into_iter()
            .filter(|fact| {
                let Some(path) = fact.path() else {
                    return true;
                };
                if path.len() > MAX_ACCESS_PATH_LENGTH || has_duplicate_fields(path) {
                    trace!(?fact, "dropping oversized fact");
                    return false;
                }
                match (&liveness, path.base.local_name()) {
                    (Some(liveness), Some(name)) => liveness.is_alive_at(name, current.index),
                    _ => true,
                }
            })
            .collect()
    }
}

fn is_known(ty: &EtsType) -> bool {
    !matches!(ty, EtsType::Unknown | EtsType::Any)
}

/// Paths a value is copied from. Operators and allocations yield `None`.
fn source_path(value: &Value) -> Option<AccessPath> {
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

fn has_duplicate_fields(path: &AccessPath) -> bool {
    let mut counts: FxHashMap<&Name, usize> = FxHashMap::default();
    path.accesses
        .iter()
        .filter_map(Accessor::field_name)
        .any(|name| {
            let count = counts.entry(name).or_default();
            *count += 1;
            *count > MAX_DUPLICATE_FIELDS
        })
}

/// Expand a seeded type into one fact per reachable path.
fn add_types(path: AccessPath, ty: &TypeFact, out: &mut Vec<ForwardFact>) {
    match ty {
        TypeFact::Unknown => out.push(ForwardFact::typed(path, TypeFact::Any)),
        TypeFact::Object(obj) => {
            for (name, property) in obj.properties.iter() {
                add_types(&path + Accessor::field(name), property, out);
            }
            out.push(ForwardFact::typed(
                path,
                TypeFact::object(obj.cls.clone(), Properties::new()),
            ));
        }
        TypeFact::Array(element) => {
            out.push(ForwardFact::typed(path.clone(), ty.clone()));
            add_types(path + Accessor::Element, element, out);
        }
        TypeFact::Guarded(guarded) => add_types(path, &guarded.ty, out),
        TypeFact::Union(members) | TypeFact::Intersection(members) => {
            for member in members.iter() {
                add_types(path.clone(), member, out);
            }
        }
        _ => out.push(ForwardFact::typed(path, ty.clone())),
    }
}

fn call_result_base(stmt: &Stmt) -> Option<AccessPathBase> {
    match stmt {
        Stmt::Assign { lhv, .. } => to_path(lhv).ok().map(|p| p.base),
        _ => None,
    }
}

impl FlowFunctions<MethodId, StmtRef> for ForwardFlowFunctions<'_> {
    type Fact = ForwardFact;

    fn obtain_possible_start_facts(&self, method: MethodId) -> Vec<ForwardFact> {
        let mut result = vec![ForwardFact::Zero];
        let scheme = self.scheme.get(&method);
        if let Some(scheme) = scheme {
            for (base, ty) in scheme {
                add_types(AccessPath::from_base(base.clone()), ty, &mut result);
            }
        }

        if self.options.add_known_types {
            let processor = TypeFactProcessor::new(self.graph.scene());
            let method = self.graph.scene().method(method);
            for local in method.locals.iter().filter(|l| l.is_temp() && is_known(&l.ty)) {
                let base = AccessPathBase::Local(local.name.clone());
                let declared = TypeFact::from_ets_type(&local.ty);
                let ty = match scheme.and_then(|s| s.get(&base)) {
                    Some(seeded) => processor
                        .intersect(seeded, &declared.fix_any_to_unknown())
                        .unwrap_or(declared),
                    None => declared,
                };
                debug!(local = %local.name, %ty, "adding known type");
                add_types(AccessPath::from_base(base), &ty, &mut result);
            }
        }
        result
    }

    fn sequent(
        &self,
        current: StmtRef,
        _next: StmtRef,
        fact: &ForwardFact,
    ) -> FlowResult<ForwardFact> {
        let stmt = self.graph.stmt(current);
        if let Stmt::Assign { lhv, rhv } = stmt {
            if let (Ok(l), Ok(r)) = (to_path(lhv), to_path(rhv)) {
                if l == r {
                    return Ok(vec![fact.clone()]);
                }
            }
        }
        let facts = match fact {
            ForwardFact::Zero => self.sequent_zero(current, stmt),
            ForwardFact::TypedVariable { path, ty } => self.sequent_fact(current, stmt, path, ty),
        };
        Ok(self.filter(current, facts))
    }

    fn call_to_return_site(
        &self,
        call: StmtRef,
        _return_site: StmtRef,
        fact: &ForwardFact,
    ) -> FlowResult<ForwardFact> {
        let stmt = self.graph.stmt(call);
        let unresolved = self.graph.callees(call).is_empty();
        let ForwardFact::TypedVariable { path, .. } = fact else {
            if unresolved {
                self.sink.report(Diagnostic::from_code(
                    DiagnosticCategory::Message,
                    diagnostic_codes::UNRESOLVED_CALL,
                    format!("{}#{}", self.method(call).signature, call.index),
                    &[&stmt.to_string()],
                ));
            }
            return Ok(vec![ForwardFact::Zero]);
        };

        if call_result_base(stmt).as_ref() == Some(&path.base) {
            return Ok(Vec::new());
        }
        if unresolved {
            return Ok(vec![fact.clone()]);
        }
        let Some(expr) = stmt.call_expr() else {
            return Ok(vec![fact.clone()]);
        };
        if let Value::InstanceCall { instance, .. } = expr {
            if to_path(instance).is_ok_and(|receiver| receiver.base == path.base) {
                return Ok(Vec::new());
            }
        }
        let passed = expr
            .call_args()
            .iter()
            .any(|arg| to_path(arg).is_ok_and(|arg| arg.base == path.base));
        Ok(if passed { Vec::new() } else { vec![fact.clone()] })
    }

    fn call_to_start(
        &self,
        call: StmtRef,
        _callee_start: StmtRef,
        fact: &ForwardFact,
    ) -> FlowResult<ForwardFact> {
        let ForwardFact::TypedVariable { path, ty } = fact else {
            return Ok(vec![ForwardFact::Zero]);
        };
        let Some(expr) = self.graph.stmt(call).call_expr() else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        if let Value::InstanceCall { instance, .. } = expr {
            if to_path(instance).is_ok_and(|receiver| receiver.base == path.base) {
                result.push(ForwardFact::typed(path.rebase(AccessPathBase::This), ty.clone()));
            }
        }
        for (index, arg) in expr.call_args().iter().enumerate() {
            if to_path(arg).is_ok_and(|arg| arg.base == path.base) {
                let index = u32::try_from(index).map_err(|_| {
                    AnalysisError::malformed_cfg(
                        format!("{}#{}", self.method(call).signature, call.index),
                        "argument index out of range",
                    )
                })?;
                result.push(ForwardFact::typed(
                    path.rebase(AccessPathBase::Arg(index)),
                    ty.clone(),
                ));
            }
        }
        Ok(result)
    }

    fn exit_to_return_site(
        &self,
        call: StmtRef,
        _return_site: StmtRef,
        exit: StmtRef,
        fact: &ForwardFact,
    ) -> FlowResult<ForwardFact> {
        let ForwardFact::TypedVariable { path, ty } = fact else {
            return Ok(vec![ForwardFact::Zero]);
        };
        let call_stmt = self.graph.stmt(call);
        let Some(expr) = call_stmt.call_expr() else {
            return Ok(Vec::new());
        };
        let target = match &path.base {
            AccessPathBase::This => match expr {
                Value::InstanceCall { instance, .. } => to_path(instance).ok().map(|p| p.base),
                _ => None,
            },
            AccessPathBase::Arg(index) => expr
                .call_args()
                .get(*index as usize)
                .and_then(|arg| to_path(arg).ok())
                .map(|p| p.base),
            base => match self.graph.stmt(exit) {
                Stmt::Return { value: Some(value) }
                    if to_path(value).is_ok_and(|returned| returned.base == *base) =>
                {
                    call_result_base(call_stmt)
                }
                _ => None,
            },
        };
        Ok(target
            .map(|base| vec![ForwardFact::typed(path.rebase(base), ty.clone())])
            .unwrap_or_default())
    }
}

/// Emits a [`Summary`] for every fact reaching an exit statement.
pub struct ForwardAnalyzer<'a> {
    flow: ForwardFlowFunctions<'a>,
}

impl<'a> ForwardAnalyzer<'a> {
    pub fn new(flow: ForwardFlowFunctions<'a>) -> Self {
        Self { flow }
    }
}

impl<'a> Analyzer<MethodId, StmtRef> for ForwardAnalyzer<'a> {
    type Fact = ForwardFact;
    type Event = AnalyzerEvent;
    type Flow = ForwardFlowFunctions<'a>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &Edge<ForwardFact, StmtRef>) -> Vec<AnalyzerEvent> {
        if !self.flow.graph.is_exit(edge.to.statement) {
            return Vec::new();
        }
        trace!(?edge, "forward summary");
        vec![AnalyzerEvent::Forward(Summary {
            method: edge.to.statement.method,
            initial: edge.from.clone(),
            exit: edge.to.clone(),
        })]
    }
}

#[cfg(test)]
#[path = "../tests/forward_tests.rs"]
mod tests;
