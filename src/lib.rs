//! An incremental CDCL SAT solver: clauses and at-most-k constraints, solving under
//! assumptions with unsat cores, save/load of the clause database, and progress callbacks.

pub mod dimacs;
pub mod solver;

pub use solver::{
    callback::{EventLimit, NoCallback, SolverCallback, SolverEvent, StopFlag},
    cdcl_solver::CDCLSolver,
    config::{ClauseMinimization, RestartPolicy, SolverConfig},
    error::SolverError,
    state::SolverState,
    stats::RuntimeStats,
    types::{LBool, Lit, Model, SolveResult, Var},
};
