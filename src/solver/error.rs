use thiserror::Error;

/// Failures caused by the caller (bad input, misuse of state handles) or by running out of
/// index space. Engine bugs are not represented here; those panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// A DIMACS literal of 0, or otherwise unencodable.
    #[error("invalid literal encoding: {0}")]
    InvalidLiteral(i64),

    /// A cardinality constraint mentioned the same literal twice.
    #[error("literal {0} occurs more than once in an at-most constraint")]
    DuplicateLiteral(i64),

    /// No more variable indices can be handed out.
    #[error("variable index space exhausted ({0} variables)")]
    VariablesExhausted(usize),

    /// The clause arena cannot hold another clause.
    #[error("clause index space exhausted ({0} clauses)")]
    ClausesExhausted(usize),

    /// The state handle was already loaded, or belongs to another solver.
    #[error("solver state {0} is not valid anymore")]
    InvalidState(usize),

    /// A valid state was loaded while a more recent one is still on the stack.
    #[error("solver state {found} loaded out of order, state {expected} must be loaded first")]
    StateOutOfOrder { expected: usize, found: usize },
}
