//! Orchestration of one inference run.
//!
//! 1. backward phase over the reversed graph, collecting backward summaries
//! 2. per-method type scheme: backward requirements intersected per base
//! 3. forward phase seeded with the scheme, collecting forward summaries
//! 4. refinement of the scheme with forward entry facts, return types,
//!    local types and combined `this` types per class
//!
//! Each phase runs on its own scoped thread. The orchestrating thread waits
//! on a [`PhaseGate`] that the runner completes when its work list drains.

use crate::backward::{BackwardAnalyzer, BackwardFlowFunctions};
use crate::cache::AnalysisCache;
use crate::facts::{AnalyzerEvent, BackwardFact, BackwardSummary, ForwardFact, ForwardSummary};
use crate::forward::{ForwardAnalyzer, ForwardFlowFunctions};
use crate::options::InferenceOptions;
use crate::refine::{Refinements, assemble, group_by_suffix, refine_scheme};
use crate::result::{MethodTypeScheme, TypeInferenceResult};
use crate::sink::DiagnosticSink;
use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, debug, info, span, warn};
use tsinfer_common::{Diagnostic, diagnostic_codes};
use tsinfer_ifds::{
    AnalysisError, Analyzer, ApplicationGraph, ControlEvent, GateOutcome, Manager, PhaseGate,
    UniRunner,
};
use tsinfer_ir::model::{ANONYMOUS_CLASS_PREFIX, TEMP_LOCAL_PREFIX};
use tsinfer_ir::{
    AccessPath, AccessPathBase, ClassId, EtsApplicationGraph, EtsType, MethodId, Reversed, Scene,
    Stmt, StmtRef, to_path,
};
use tsinfer_solver::{TypeFact, TypeFactProcessor};

pub struct TypeInferenceManager<'s> {
    scene: &'s Scene,
    graph: EtsApplicationGraph<'s>,
    options: InferenceOptions,
    backward_summaries: DashMap<MethodId, FxHashSet<BackwardSummary>>,
    forward_summaries: DashMap<MethodId, FxHashSet<ForwardSummary>>,
    gate: PhaseGate,
    cancelled: AtomicBool,
    cache: AnalysisCache,
    sink: DiagnosticSink,
}

/// Fails the gate when the runner thread unwinds, so the waiting side
/// does not block forever.
struct UnwindGuard<'g>(&'g PhaseGate);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0
                .fail(AnalysisError::RunnerFailed("runner panicked".to_string()));
        }
    }
}

/// Bases kept in a method's type scheme.
fn is_scheme_base(base: &AccessPathBase) -> bool {
    match base {
        AccessPathBase::This | AccessPathBase::Arg(_) | AccessPathBase::Static => true,
        AccessPathBase::Local(name) => name.starts_with(TEMP_LOCAL_PREFIX),
        AccessPathBase::Const(_) => false,
    }
}

impl<'s> TypeInferenceManager<'s> {
    pub fn new(scene: &'s Scene, options: InferenceOptions) -> Self {
        Self {
            scene,
            graph: EtsApplicationGraph::new(scene),
            options,
            backward_summaries: DashMap::new(),
            forward_summaries: DashMap::new(),
            gate: PhaseGate::new(),
            cancelled: AtomicBool::new(false),
            cache: AnalysisCache::new(),
            sink: DiagnosticSink::new(),
        }
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }

    /// Drain the diagnostics reported so far.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.take()
    }

    pub fn backward_summaries_of(&self, method: MethodId) -> Vec<BackwardSummary> {
        self.backward_summaries
            .get(&method)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn forward_summaries_of(&self, method: MethodId) -> Vec<ForwardSummary> {
        self.forward_summaries
            .get(&method)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Infer types starting from `entry`. Methods of `all_methods` left
    /// without inferred types get a second round with themselves as entries.
    pub fn analyze(
        &self,
        entry: &[MethodId],
        all_methods: Option<&[MethodId]>,
    ) -> Result<TypeInferenceResult, AnalysisError> {
        let mut result = self.analyze_round(entry)?;

        if let Some(all_methods) = all_methods {
            let remaining: Vec<MethodId> = all_methods
                .iter()
                .copied()
                .filter(|m| !result.inferred_types.contains_key(m))
                .collect();
            if !remaining.is_empty() {
                info!(count = remaining.len(), "Analyzing remaining methods");
                let second = self.analyze_round(&remaining)?;
                for (method, types) in second.inferred_types {
                    result.inferred_types.entry(method).or_insert(types);
                }
                for (method, ty) in second.inferred_return_type {
                    result.inferred_return_type.entry(method).or_insert(ty);
                }
                for (class, ty) in second.inferred_combined_this_type {
                    result.inferred_combined_this_type.entry(class).or_insert(ty);
                }
            }
        }

        if self.options.guess_types {
            result = result.with_guessed_types(self.scene);
        }
        Ok(result)
    }

    fn analyze_round(&self, entry: &[MethodId]) -> Result<TypeInferenceResult, AnalysisError> {
        let backward_flow = BackwardFlowFunctions::new(&self.graph, &self.cache, &self.sink);
        let backward = BackwardAnalyzer::new(backward_flow);
        {
            let _span = span!(Level::INFO, "backward").entered();
            info!(entries = entry.len(), "Running backward analysis");
            self.run_phase("backward", &Reversed::new(&self.graph), &backward, entry)?;
            info!(
                methods = self.backward_summaries.len(),
                "Backward analysis finished"
            );
        }

        let scheme = self.method_type_scheme();
        for (method, types) in &scheme {
            debug!(method = %self.scene.method(*method).signature, ?types, "backward types");
        }
        let type_info = self.type_info(backward.flow_functions().saved_types());

        let forward_flow = ForwardFlowFunctions::new(
            &self.graph,
            &self.options,
            &scheme,
            &type_info,
            &self.cache,
            &self.sink,
        );
        let forward = ForwardAnalyzer::new(forward_flow);
        {
            let _span = span!(Level::INFO, "forward").entered();
            info!("Running forward analysis");
            self.run_phase("forward", &self.graph, &forward, entry)?;
            info!(
                methods = self.forward_summaries.len(),
                "Forward analysis finished"
            );
        }

        let _span = span!(Level::INFO, "refine").entered();
        Ok(self.assemble_result(&scheme))
    }

    /// Run one phase to completion (or to its deadline).
    fn run_phase<G, A>(
        &self,
        phase: &str,
        graph: &G,
        analyzer: &A,
        entry: &[MethodId],
    ) -> Result<(), AnalysisError>
    where
        G: ApplicationGraph<Method = MethodId, Statement = StmtRef> + Sync,
        A: Analyzer<MethodId, StmtRef, Event = AnalyzerEvent> + Sync,
    {
        self.gate.reset();
        self.cancelled.store(false, Ordering::Relaxed);

        let outcome = std::thread::scope(|scope| {
            scope.spawn(|| {
                let _guard = UnwindGuard(&self.gate);
                let mut runner = UniRunner::new(graph, analyzer, self, &self.cancelled);
                match runner.run(entry) {
                    Ok(()) => self.gate.complete(),
                    Err(error) => self.gate.fail(error),
                }
            });
            let outcome = self.gate.wait(self.options.phase_timeout());
            if matches!(outcome, Ok(GateOutcome::TimedOut)) {
                self.cancelled.store(true, Ordering::Relaxed);
            }
            outcome
        })?;

        if outcome == GateOutcome::TimedOut {
            let timeout = self.options.phase_timeout_ms.unwrap_or_default();
            self.sink.report(Diagnostic::warning(
                diagnostic_codes::PHASE_TIMEOUT,
                phase,
                &[phase, &timeout.to_string()],
            ));
        }
        Ok(())
    }

    /// Backward requirements per method, intersected per base.
    pub fn method_type_scheme(&self) -> FxHashMap<MethodId, MethodTypeScheme> {
        let processor = TypeFactProcessor::new(self.scene);
        let mut scheme = FxHashMap::default();

        for entry in &self.backward_summaries {
            let method = *entry.key();
            let mut exits: Vec<(&AccessPathBase, &TypeFact)> = entry
                .value()
                .iter()
                .filter_map(|summary| match &summary.exit.fact {
                    BackwardFact::TypedVariable { base, ty } if is_scheme_base(base) => {
                        Some((base, ty))
                    }
                    _ => None,
                })
                .collect();
            exits.sort();

            let mut types = MethodTypeScheme::new();
            for (base, ty) in exits {
                let merged = match types.get(base) {
                    None => ty.clone(),
                    Some(acc) => match processor.intersect(acc, ty) {
                        Some(merged) => merged,
                        None => {
                            self.report_empty_intersection(method, acc, ty);
                            continue;
                        }
                    },
                };
                types.insert(base.clone(), merged);
            }
            if !types.is_empty() {
                scheme.insert(method, types);
            }
        }
        scheme
    }

    /// `typeInfo[T]`: everything required of fresh `T` instances.
    fn type_info(&self, saved: Vec<(EtsType, Vec<TypeFact>)>) -> FxHashMap<EtsType, TypeFact> {
        let processor = TypeFactProcessor::new(self.scene);
        saved
            .into_iter()
            .map(|(ty, requirements)| {
                let mut info = TypeFact::object(Some(ty.clone()), Default::default());
                for requirement in &requirements {
                    match processor.intersect(&info, requirement) {
                        Some(merged) => info = merged,
                        None => self.sink.report(Diagnostic::warning(
                            diagnostic_codes::EMPTY_INTERSECTION,
                            ty.type_name(),
                            &[&info.to_string_limited(), &requirement.to_string_limited()],
                        )),
                    }
                }
                (ty, info)
            })
            .collect()
    }

    fn report_empty_intersection(&self, method: MethodId, a: &TypeFact, b: &TypeFact) {
        self.sink.report(Diagnostic::warning(
            diagnostic_codes::EMPTY_INTERSECTION,
            self.scene.method(method).signature.to_string(),
            &[&a.to_string_limited(), &b.to_string_limited()],
        ));
    }

    /// Forward facts holding at the entry of `method`, on scheme bases.
    fn initial_facts(&self, method: MethodId) -> Vec<(AccessPath, TypeFact)> {
        let mut facts: Vec<_> = self
            .forward_summaries
            .get(&method)
            .map(|summaries| {
                summaries
                    .iter()
                    .filter_map(|summary| match &summary.initial.fact {
                        ForwardFact::TypedVariable { path, ty } if is_scheme_base(&path.base) => {
                            Some((path.clone(), ty.clone()))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        facts.sort();
        facts.dedup();
        facts
    }

    /// Forward facts holding at exits of `method`, with their exit statement.
    fn exit_facts(&self, method: MethodId) -> Vec<(StmtRef, AccessPath, TypeFact)> {
        let mut facts: Vec<_> = self
            .forward_summaries
            .get(&method)
            .map(|summaries| {
                summaries
                    .iter()
                    .filter_map(|summary| match &summary.exit.fact {
                        ForwardFact::TypedVariable { path, ty } => {
                            Some((summary.exit.statement, path.clone(), ty.clone()))
                        }
                        ForwardFact::Zero => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        facts.sort();
        facts.dedup();
        facts
    }

    /// Narrow every scheme entry with the forward facts seen at entry.
    pub fn refine_method_types(
        &self,
        scheme: &FxHashMap<MethodId, MethodTypeScheme>,
    ) -> BTreeMap<MethodId, MethodTypeScheme> {
        let processor = TypeFactProcessor::new(self.scene);
        let mut refined = BTreeMap::new();
        for (&method, types) in scheme {
            let initial = self.initial_facts(method);
            let grouped = group_by_suffix(&processor, initial.iter().map(|(p, t)| (p, t)));
            let method_types: MethodTypeScheme = types
                .iter()
                .map(|(base, ty)| {
                    let ty = match grouped.get(base) {
                        Some(refinements) => self.refine(&processor, method, ty, refinements),
                        None => ty.clone(),
                    };
                    (base.clone(), ty)
                })
                .collect();
            refined.insert(method, method_types);
        }
        refined
    }

    fn refine(
        &self,
        processor: &TypeFactProcessor<'_>,
        method: MethodId,
        scheme: &TypeFact,
        refinements: &Refinements,
    ) -> TypeFact {
        refine_scheme(processor, scheme, refinements, |current, _, refined| {
            self.report_empty_intersection(method, current, refined);
        })
    }

    fn assemble_result(&self, scheme: &FxHashMap<MethodId, MethodTypeScheme>) -> TypeInferenceResult {
        let processor = TypeFactProcessor::new(self.scene);
        let mut inferred_types = self.refine_method_types(scheme);
        let mut inferred_return_type = BTreeMap::new();

        let mut analyzed: Vec<MethodId> = self
            .forward_summaries
            .iter()
            .map(|entry| *entry.key())
            .collect();
        analyzed.sort();

        for &method in &analyzed {
            let exits = self.exit_facts(method);

            let returned = exits.iter().filter(|(stmt, path, _)| {
                matches!(
                    self.graph.stmt(*stmt),
                    Stmt::Return { value: Some(value) }
                        if to_path(value).is_ok_and(|v| v.base == path.base)
                )
            });
            let by_base = group_by_suffix(&processor, returned.map(|(_, p, t)| (p, t)));
            let return_type = by_base
                .values()
                .map(assemble)
                .reduce(|acc, ty| processor.union(&acc, &ty));
            if let Some(ty) = return_type {
                inferred_return_type.insert(method, ty);
            }

            if self.options.infer_all_locals {
                let locals = exits
                    .iter()
                    .filter(|(_, path, _)| matches!(path.base, AccessPathBase::Local(_)));
                let by_base = group_by_suffix(&processor, locals.map(|(_, p, t)| (p, t)));
                if !by_base.is_empty() {
                    let types = inferred_types.entry(method).or_default();
                    for (base, refinements) in &by_base {
                        types
                            .entry(base.clone())
                            .or_insert_with(|| assemble(refinements));
                    }
                }
            }
        }

        let inferred_combined_this_type = self.combined_this_types(scheme, &processor);

        for types in inferred_types.values_mut() {
            for ty in types.values_mut() {
                *ty = ty.simplify();
            }
        }
        for ty in inferred_return_type.values_mut() {
            *ty = ty.simplify();
        }

        TypeInferenceResult {
            inferred_types,
            inferred_return_type,
            inferred_combined_this_type,
        }
    }

    /// One `this` type per class: the intersection of its methods' `this`
    /// schemes, refined with what forward analysis saw entering its methods
    /// and leaving its constructors.
    fn combined_this_types(
        &self,
        scheme: &FxHashMap<MethodId, MethodTypeScheme>,
        processor: &TypeFactProcessor<'_>,
    ) -> BTreeMap<ClassId, TypeFact> {
        let mut combined = BTreeMap::new();
        for class in self.scene.classes() {
            if class.signature.name.starts_with(ANONYMOUS_CLASS_PREFIX) {
                continue;
            }

            let mut start: Option<TypeFact> = None;
            let mut observed: Vec<(AccessPath, TypeFact)> = Vec::new();
            for &method_id in &class.methods {
                let method = self.scene.method(method_id);
                if let Some(this) = scheme.get(&method_id).and_then(|s| s.get(&AccessPathBase::This)) {
                    start = Some(match start {
                        None => this.clone(),
                        Some(acc) => processor.intersect(&acc, this).unwrap_or_else(|| {
                            self.report_empty_intersection(method_id, &acc, this);
                            acc
                        }),
                    });
                }
                if !method.is_instance_init() {
                    observed.extend(
                        self.initial_facts(method_id)
                            .into_iter()
                            .filter(|(path, _)| path.base == AccessPathBase::This),
                    );
                }
                if method.is_constructor() || method.is_instance_init() {
                    observed.extend(
                        self.exit_facts(method_id)
                            .into_iter()
                            .filter(|(_, path, _)| path.base == AccessPathBase::This)
                            .map(|(_, path, ty)| (path, ty)),
                    );
                }
            }

            // Classes whose methods never use `this` get no combined type.
            let Some(start) = start else {
                continue;
            };
            let grouped = group_by_suffix(processor, observed.iter().map(|(p, t)| (p, t)));
            let ty = match grouped.get(&AccessPathBase::This) {
                None => start,
                Some(refinements) => {
                    let method = class.methods.first().copied();
                    refine_scheme(processor, &start, refinements, |current, _, refined| {
                        match method {
                            Some(method) => self.report_empty_intersection(method, current, refined),
                            None => warn!(class = %class.signature, "empty intersection"),
                        }
                    })
                }
            };
            combined.insert(class.id, ty.simplify());
        }
        combined
    }
}

impl Manager<AnalyzerEvent> for TypeInferenceManager<'_> {
    fn handle_event(&self, event: AnalyzerEvent) {
        match event {
            AnalyzerEvent::Backward(summary) => {
                self.backward_summaries
                    .entry(summary.method)
                    .or_default()
                    .insert(summary);
            }
            AnalyzerEvent::Forward(summary) => {
                self.forward_summaries
                    .entry(summary.method)
                    .or_default()
                    .insert(summary);
            }
        }
    }

    fn handle_control_event(&self, event: ControlEvent) {
        match event {
            ControlEvent::QueueEmptinessChanged { is_empty: true } => self.gate.complete(),
            ControlEvent::QueueEmptinessChanged { is_empty: false } => {}
        }
    }
}

#[cfg(test)]
#[path = "../tests/manager_tests.rs"]
mod tests;
