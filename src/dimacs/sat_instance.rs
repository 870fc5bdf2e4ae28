use std::fmt::Debug;

use fxhash::FxHashSet;

use crate::solver::{cdcl_solver::CDCLSolver, error::SolverError};

#[derive(Clone)]
pub struct SATInstance {
    pub n_vars: usize,
    pub n_clauses: usize,
    pub clauses: Vec<Clause>,
    // (Positive) list of all variables in the instance
    pub vars: FxHashSet<Variable>,
}

impl SATInstance {
    /// Creates the declared variables in the solver and adds every clause. Returns false if
    /// the solver found the clauses unsatisfiable while adding them.
    pub fn add_to(&self, solver: &mut CDCLSolver) -> Result<bool, SolverError> {
        solver.ensure_vars(self.n_vars)?;
        let mut ok = true;
        for c in &self.clauses {
            ok &= solver.add_clause_dimacs(&c.lits)?;
        }
        Ok(ok)
    }
}

impl Debug for SATInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "n_vars: {}\tn_clauses: {}", self.n_vars, self.n_clauses)?;
        for c in &self.clauses {
            write!(f, "Clause:")?;
            for l in &c.lits {
                write!(f, " {l}")?;
            }
            writeln!(f)?;
        }
        writeln!(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub lits: Vec<Literal>,
}

pub type Literal = i64;
pub type Variable = u64;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimacs::parser::DimacsParser;
    use crate::solver::config::SolverConfig;

    #[test]
    fn loads_into_solver() {
        let inst = DimacsParser::from_reader("p cnf 4 2\n1 -2 0\n-1 0\n".as_bytes())
            .parse()
            .unwrap();
        let mut s = CDCLSolver::default();
        assert!(inst.add_to(&mut s).unwrap());
        assert_eq!(s.n_vars(), 4);
        let m = s.solve().unwrap();
        let m = m.model().unwrap();
        assert_eq!(m.to_dimacs(), vec![-1, -2, 3, 4]);
    }

    #[test]
    fn declared_vars_take_the_configured_phase() {
        let inst = DimacsParser::from_reader("p cnf 4 1\n1 2 3 0\n".as_bytes())
            .parse()
            .unwrap();
        let conf = SolverConfig {
            initial_phase: false,
            ..Default::default()
        };
        let mut s = CDCLSolver::new(conf);
        assert!(inst.add_to(&mut s).unwrap());
        let res = s.solve().unwrap();
        assert_eq!(res.model().unwrap().to_dimacs(), vec![-1, -2, 3, -4]);
    }
}
