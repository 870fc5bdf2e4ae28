/// Solver imports
pub mod analyze;
pub mod cdcl_solver;

/// Solver (and corresponding optimization) related imports
pub mod assignment_trail;
pub mod bounded_queue;
pub mod var_order;
pub mod watch_list;

pub mod callback;
pub mod clause;
/// Solver config
pub mod config;
pub mod error;
pub mod state;

pub mod stats;
/// General util/definitions
pub mod types;

pub mod util;
