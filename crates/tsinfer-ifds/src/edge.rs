use std::fmt;

/// A node of the exploded supergraph: a fact holding at a statement.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Vertex<F, S> {
    pub statement: S,
    pub fact: F,
}

impl<F, S> Vertex<F, S> {
    pub const fn new(statement: S, fact: F) -> Self {
        Self { statement, fact }
    }
}

impl<F: fmt::Debug, S: fmt::Debug> fmt::Debug for Vertex<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?} @ {:?})", self.fact, self.statement)
    }
}

/// A path edge from the start vertex of a method to a vertex inside it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Edge<F, S> {
    pub from: Vertex<F, S>,
    pub to: Vertex<F, S>,
}

impl<F: Clone, S: Copy> Edge<F, S> {
    pub const fn new(from: Vertex<F, S>, to: Vertex<F, S>) -> Self {
        Self { from, to }
    }

    /// The self-loop edge used to seed a method start.
    pub fn seed(vertex: Vertex<F, S>) -> Self {
        Self {
            from: vertex.clone(),
            to: vertex,
        }
    }
}

impl<F: fmt::Debug, S: fmt::Debug> fmt::Debug for Edge<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {:?}", self.from, self.to)
    }
}
