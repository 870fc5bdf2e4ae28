#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    /// Record total (i.e. monotonically increasing) number of:
    /// - solves: number of solve attempts.
    /// - restarts: number of restarts.
    /// - blocked_restarts: number of times a Glucose restart was blocked.
    /// - decisions: number of decisions made.
    /// - rand_decisions: number of rand_decisions made.
    /// - propagations: number of propagations made.
    /// - conflicts: number of conflicts that occur
    /// - reductions: number of learnt database reductions
    /// - deletions: number of learnt clauses deleted by reductions
    pub solves: u64,
    pub restarts: u64,
    pub blocked_restarts: u64,
    pub decisions: u64,
    pub rand_decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub reductions: u64,
    pub deletions: u64,

    /// Record current values of:
    /// - n_clauses: num of constraint clauses
    /// - n_clause_lits: num lits in constraint clauses
    /// - n_learnts: num learnt clauses
    /// - n_learnt_lits: num lits in learnt clauses
    /// And totals of:
    /// - tot_lits: total literals learnt
    /// - max_lits: max possible literals learnt (before CCM)
    pub n_clauses: u64,
    pub n_clause_lits: u64,
    pub n_learnts: u64,
    pub n_learnt_lits: u64,
    pub tot_lits: u64,
    pub max_lits: u64,
}
