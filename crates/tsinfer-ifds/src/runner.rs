//! The tabulation algorithm over the exploded supergraph.
//!
//! Path edges `(start vertex -> current vertex)` are processed from a FIFO
//! work list. Three kinds of statements are distinguished:
//!
//! - **call sites**: facts flow around the call (call-to-return-site) and into
//!   every resolved callee (call-to-start); the caller edge is remembered so
//!   summaries found later can be applied, and summaries already known are
//!   applied right away
//! - **exits**: the edge is a new summary for its start vertex and is applied
//!   at every recorded caller
//! - **everything else**: sequent flow to each successor
//!
//! When the work list drains, the manager receives
//! `QueueEmptinessChanged { is_empty: true }` and the run ends.

use crate::edge::{Edge, Vertex};
use crate::error::AnalysisError;
use crate::flow::{Analyzer, FlowFunctions};
use crate::graph::ApplicationGraph;
use crate::manager::{ControlEvent, Manager};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

type VertexOf<G, F> = Vertex<F, <G as ApplicationGraph>::Statement>;
type EdgeOf<G, F> = Edge<F, <G as ApplicationGraph>::Statement>;

/// Facts per statement after a run.
#[derive(Debug, Clone)]
pub struct IfdsResult<F, S> {
    pub path_edges: Vec<Edge<F, S>>,
    pub facts: FxHashMap<S, FxHashSet<F>>,
}

impl<F: Eq + std::hash::Hash, S: Eq + std::hash::Hash> IfdsResult<F, S> {
    pub fn facts_at(&self, statement: &S) -> Option<&FxHashSet<F>> {
        self.facts.get(statement)
    }
}

/// A single-unit IFDS runner.
pub struct UniRunner<'a, G, A, M>
where
    G: ApplicationGraph,
    A: Analyzer<G::Method, G::Statement>,
{
    graph: &'a G,
    analyzer: &'a A,
    manager: &'a M,
    cancelled: &'a AtomicBool,
    path_edges: FxHashSet<EdgeOf<G, A::Fact>>,
    work_list: VecDeque<EdgeOf<G, A::Fact>>,
    summary_edges: FxHashMap<VertexOf<G, A::Fact>, FxHashSet<VertexOf<G, A::Fact>>>,
    caller_path_edge_of: FxHashMap<VertexOf<G, A::Fact>, FxHashSet<EdgeOf<G, A::Fact>>>,
}

impl<'a, G, A, M> UniRunner<'a, G, A, M>
where
    G: ApplicationGraph,
    A: Analyzer<G::Method, G::Statement>,
    M: Manager<A::Event>,
{
    pub fn new(graph: &'a G, analyzer: &'a A, manager: &'a M, cancelled: &'a AtomicBool) -> Self {
        Self {
            graph,
            analyzer,
            manager,
            cancelled,
            path_edges: FxHashSet::default(),
            work_list: VecDeque::new(),
            summary_edges: FxHashMap::default(),
            caller_path_edge_of: FxHashMap::default(),
        }
    }

    /// Seed every start method and run the tabulation until the work list is
    /// empty or the run is cancelled.
    pub fn run(&mut self, start_methods: &[G::Method]) -> Result<(), AnalysisError> {
        for &method in start_methods {
            self.add_start(method);
        }
        self.tabulation_algorithm()
    }

    fn add_start(&mut self, method: G::Method) {
        let analyzer: &'a A = self.analyzer;
        let start_facts = analyzer
            .flow_functions()
            .obtain_possible_start_facts(method);
        debug!(?method, facts = start_facts.len(), "adding start method");
        for fact in start_facts {
            for start in self.graph.entry_points(method) {
                let vertex = Vertex::new(start, fact.clone());
                self.propagate(Edge::seed(vertex));
            }
        }
    }

    fn propagate(&mut self, edge: EdgeOf<G, A::Fact>) -> bool {
        if self.path_edges.contains(&edge) {
            return false;
        }
        trace!(?edge, "propagating edge");
        for event in self.analyzer.handle_new_edge(&edge) {
            self.manager.handle_event(event);
        }
        self.path_edges.insert(edge.clone());
        self.work_list.push_back(edge);
        true
    }

    fn tabulation_algorithm(&mut self) -> Result<(), AnalysisError> {
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                debug!("runner cancelled");
                return Ok(());
            }
            let Some(edge) = self.work_list.pop_front() else {
                self.manager
                    .handle_control_event(ControlEvent::QueueEmptinessChanged { is_empty: true });
                return Ok(());
            };
            self.tabulation_algorithm_step(edge)?;
        }
    }

    fn tabulation_algorithm_step(&mut self, current_edge: EdgeOf<G, A::Fact>) -> Result<(), AnalysisError> {
        let analyzer: &'a A = self.analyzer;
        let flow = analyzer.flow_functions();
        let start_vertex = current_edge.from.clone();
        let current = current_edge.to.statement;
        let current_fact = &current_edge.to.fact;

        if self.graph.is_call(current) {
            for return_site in self.graph.successors(current) {
                for fact in flow.call_to_return_site(current, return_site, current_fact)? {
                    let to = Vertex::new(return_site, fact);
                    self.propagate(Edge::new(start_vertex.clone(), to));
                }
            }

            for callee in self.graph.callees(current) {
                for callee_start in self.graph.entry_points(callee) {
                    for fact in flow.call_to_start(current, callee_start, current_fact)? {
                        let callee_start_vertex = Vertex::new(callee_start, fact);

                        self.caller_path_edge_of
                            .entry(callee_start_vertex.clone())
                            .or_default()
                            .insert(current_edge.clone());

                        self.propagate(Edge::seed(callee_start_vertex.clone()));

                        let known_exits: Vec<_> = self
                            .summary_edges
                            .get(&callee_start_vertex)
                            .map(|exits| exits.iter().cloned().collect())
                            .unwrap_or_default();
                        for exit_vertex in known_exits {
                            let summary = Edge::new(callee_start_vertex.clone(), exit_vertex);
                            self.handle_summary_edge(&current_edge, &summary)?;
                        }
                    }
                }
            }
        } else {
            if self.graph.is_exit(current) {
                let callers: Vec<_> = self
                    .caller_path_edge_of
                    .get(&start_vertex)
                    .map(|edges| edges.iter().cloned().collect())
                    .unwrap_or_default();
                for caller_edge in callers {
                    self.handle_summary_edge(&caller_edge, &current_edge)?;
                }
                self.summary_edges
                    .entry(start_vertex.clone())
                    .or_default()
                    .insert(current_edge.to.clone());
            }

            for next in self.graph.successors(current) {
                for fact in flow.sequent(current, next, current_fact)? {
                    let to = Vertex::new(next, fact);
                    self.propagate(Edge::new(start_vertex.clone(), to));
                }
            }
        }
        Ok(())
    }

    fn handle_summary_edge(
        &mut self,
        caller_edge: &EdgeOf<G, A::Fact>,
        summary_edge: &EdgeOf<G, A::Fact>,
    ) -> Result<(), AnalysisError> {
        let analyzer: &'a A = self.analyzer;
        let flow = analyzer.flow_functions();
        let call = caller_edge.to.statement;
        let exit = summary_edge.to.statement;
        for return_site in self.graph.successors(call) {
            for fact in flow.exit_to_return_site(call, return_site, exit, &summary_edge.to.fact)? {
                let to = Vertex::new(return_site, fact);
                self.propagate(Edge::new(caller_edge.from.clone(), to));
            }
        }
        Ok(())
    }

    pub fn ifds_result(&self) -> IfdsResult<A::Fact, G::Statement> {
        let mut facts: FxHashMap<G::Statement, FxHashSet<A::Fact>> = FxHashMap::default();
        for edge in &self.path_edges {
            facts
                .entry(edge.to.statement)
                .or_default()
                .insert(edge.to.fact.clone());
        }
        IfdsResult {
            path_edges: self.path_edges.iter().cloned().collect(),
            facts,
        }
    }
}

#[cfg(test)]
#[path = "../tests/runner_tests.rs"]
mod tests;
