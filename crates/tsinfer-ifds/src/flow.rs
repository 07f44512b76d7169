use crate::edge::Edge;
use crate::error::AnalysisError;
use std::fmt::Debug;
use std::hash::Hash;

/// Facts produced by one flow function application.
pub type FlowResult<F> = Result<Vec<F>, AnalysisError>;

/// The four IFDS transfer functions plus start-fact seeding.
///
/// `M` and `S` are the method and statement handles of the graph the
/// functions are run over. For a backward analysis this is the reversed graph,
/// so "entry" and "exit" are swapped relative to the program text.
pub trait FlowFunctions<M, S> {
    type Fact: Clone + Eq + Hash + Debug;

    fn obtain_possible_start_facts(&self, method: M) -> Vec<Self::Fact>;

    /// Intraprocedural step from `current` to its successor `next`.
    fn sequent(&self, current: S, next: S, fact: &Self::Fact) -> FlowResult<Self::Fact>;

    /// Facts that bypass the callee, from a call to its return site.
    fn call_to_return_site(
        &self,
        call: S,
        return_site: S,
        fact: &Self::Fact,
    ) -> FlowResult<Self::Fact>;

    /// Facts entering the callee at `callee_start`.
    fn call_to_start(&self, call: S, callee_start: S, fact: &Self::Fact) -> FlowResult<Self::Fact>;

    /// Facts leaving the callee at `exit` back into the caller's return site.
    fn exit_to_return_site(
        &self,
        call: S,
        return_site: S,
        exit: S,
        fact: &Self::Fact,
    ) -> FlowResult<Self::Fact>;
}

/// An analysis: flow functions plus a hook observing every new path edge.
pub trait Analyzer<M, S> {
    type Fact: Clone + Eq + Hash + Debug;
    type Event;
    type Flow: FlowFunctions<M, S, Fact = Self::Fact>;

    fn flow_functions(&self) -> &Self::Flow;

    /// Events (typically summaries) derived from a newly discovered edge.
    fn handle_new_edge(&self, edge: &Edge<Self::Fact, S>) -> Vec<Self::Event>;
}
