use std::{cmp::Ordering, mem};

use log::{debug, info, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    assignment_trail::AssignmentStack,
    callback::{NoCallback, SolverCallback, SolverEvent},
    clause::{Clause, ClauseAllocator, ClauseKey, Reason},
    config::{
        ClauseDeletionConfig, DecisionConfig, DeletionSortOption, OptConfig, RestartConfig,
        RestartPolicy, SolverConfig,
    },
    error::SolverError,
    state::{SolverState, StateStack},
    stats::RuntimeStats,
    types::{DecisionLevel, LBool, Lit, Model, SolveResult, Var, LBD, MAX_VARS},
    var_order::VarOrder,
    watch_list::{WatchList, Watcher},
};

/// Value of a literal under the given assignment.
#[inline(always)]
pub(super) fn lit_value(assigned: &[LBool], l: Lit) -> LBool {
    assigned[l.var()] ^ LBool::from(l.sign() as u8)
}

/// Outcome of processing an at-most watcher.
enum AtMostWatch {
    /// The watch moved to another literal; drop this watcher.
    Moved,
    /// Keep watching (possibly after implying literals).
    Keep,
    Conflict,
}

/// Outcome of one search run, before the solver returns to level 0.
enum SearchResult {
    Sat(Model),
    Unsat(Vec<Lit>),
    Aborted,
}

pub struct CDCLSolver {
    pub(super) ca: ClauseAllocator,
    /// Problem information: constraint clauses (in creation order), learnt clauses.
    pub(super) clauses: Vec<ClauseKey>,
    pub(super) learnts: Vec<ClauseKey>,
    /// Literals asserted at level 0 without a clause, in the order they were added, learnt, or
    /// lost their reason to simplification. Replayed when a state is loaded.
    pub(super) units: Vec<Lit>,

    /// Search/inference fields.
    ///
    /// Assignment stack during search and inference; will need to rewind on conflicts.
    pub(super) trail: AssignmentStack,
    /// Watch list (i.e. occurrence list) for literals to track which clauses are watching them.
    pub(super) watches: WatchList,
    /// Literals assumed for the current solve; assumption i is decided on level i + 1.
    pub(super) assumptions: Vec<Lit>,
    /// Assumptions queued for the next solve.
    queued_assumptions: Vec<Lit>,
    /// False once the clauses are known to be unsatisfiable without assumptions.
    pub(super) ok: bool,

    // General options, decision heuristics, clause deletion, and restart policies
    pub(super) conf: OptConfig,
    pub(super) dh_conf: DecisionConfig,
    pub(super) cd_conf: ClauseDeletionConfig,
    pub(super) rs_conf: RestartConfig,

    /// Variable/Literal metadata.
    ///
    /// We use separate vectors, as opposed to one struct, to optimize cache accesses if we only
    /// need some subset of the data (which is almost always the case).
    ///
    /// Var -> assignment (if exists)
    pub(super) assigned: Vec<LBool>,
    /// Var -> polarity
    /// Value to try first when deciding the variable; updated on backtrack if phase saving.
    pub(super) polarity: Vec<bool>,
    /// Var -> reason information
    /// Useful for conflict analysis (i.e. needed when iterating backwards to detect UIP)
    pub(super) reasons: Vec<Reason>,
    /// Activities and decision heap.
    pub(super) order: VarOrder,
    pub(super) rng: StdRng,

    /// Learnt clause activity increment.
    pub(super) cla_inc: f64,
    /// Reduce once this many learnts are deletable.
    pub(super) max_learnts: f64,
    /// Number of learnts with can_be_del set.
    pub(super) n_deletable: usize,
    /// Trail size at the last level 0 simplification.
    simp_db_assigns: Option<usize>,

    pub(super) states: StateStack,
    model: Option<Model>,

    /// Temporary computation structures, in order to prevent repetitive allocation/deallocation.
    ///
    /// Var -> bool
    /// Used to remember if a variable has already been seen in conflict analysis and clause
    /// minimization. Remember to clear using seen_to_clear!
    pub(super) seen: Vec<bool>,
    /// Stack of vars
    /// Clear seen values after done.
    pub(super) seen_to_clear: Vec<Var>,
    /// Stack of lits
    /// Used in conflict analysis for clause minimization
    pub(super) analyze_stack: Vec<Lit>,
    /// Vec of lits
    /// Scratch space for reason lits (copy to/from here to avoid mutable ownership issues)
    pub(super) reason_lits: Vec<Lit>,
    /// Current level lits implied by learnt clauses during the last analysis.
    pub(super) last_dl_lits: Vec<Lit>,
    /// Level -> stamp, for counting distinct levels.
    pub(super) perm_diff: Vec<u64>,
    pub(super) perm_flag: u64,

    /// Stats.
    pub(super) stats: RuntimeStats,
}

impl Default for CDCLSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl CDCLSolver {
    pub fn new(c: SolverConfig) -> Self {
        let dh_conf = c.decision_config();
        let cd_conf = c.clause_deletion_config();
        Self {
            ca: ClauseAllocator::new(0),
            clauses: vec![],
            learnts: vec![],
            units: vec![],
            trail: AssignmentStack::new(0),
            watches: WatchList::new(0),
            assumptions: vec![],
            queued_assumptions: vec![],
            ok: true,
            conf: c.opt_config(),
            rng: StdRng::seed_from_u64(dh_conf.seed),
            order: VarOrder::new(0, &dh_conf),
            dh_conf,
            cla_inc: cd_conf.inc_var,
            max_learnts: 0.,
            n_deletable: 0,
            cd_conf,
            rs_conf: c.restart_config(),
            assigned: vec![],
            polarity: vec![],
            reasons: vec![],
            simp_db_assigns: None,
            states: StateStack::default(),
            model: None,
            seen: vec![],
            seen_to_clear: vec![],
            analyze_stack: vec![],
            reason_lits: vec![],
            last_dl_lits: vec![],
            perm_diff: vec![],
            perm_flag: 0,
            stats: RuntimeStats::default(),
        }
    }

    pub fn n_vars(&self) -> usize {
        self.assigned.len()
    }

    /// Number of permanent constraints (clauses and at-most constraints, units excluded).
    pub fn n_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn n_learnts(&self) -> usize {
        self.learnts.len()
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// The model found by the last solve, if it was satisfiable.
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Value of the literal at the current level (level 0 between solves).
    pub fn value(&self, l: Lit) -> LBool {
        match self.assigned.get(l.var()) {
            Some(_) => lit_value(&self.assigned, l),
            None => LBool::Undef,
        }
    }

    pub(super) fn decision_level(&self) -> DecisionLevel {
        self.trail.decision_level()
    }

    pub(super) fn level(&self, v: Var) -> DecisionLevel {
        self.reasons[v].dl
    }

    /// Creates a new variable with the polarity tried first when deciding it, and whether it
    /// may be decided at all.
    pub fn new_var(&mut self, polarity: bool, decision: bool) -> Result<Var, SolverError> {
        if self.n_vars() >= MAX_VARS {
            return Err(SolverError::VariablesExhausted(MAX_VARS));
        }
        self.assigned.push(LBool::Undef);
        self.polarity.push(polarity);
        self.reasons.push(Reason::default());
        self.seen.push(false);
        self.watches.grow();
        Ok(self.order.grow(decision))
    }

    /// Makes sure at least n variables exist. New ones are decision variables with the
    /// configured initial phase.
    pub fn ensure_vars(&mut self, n: usize) -> Result<(), SolverError> {
        if n > MAX_VARS {
            return Err(SolverError::VariablesExhausted(MAX_VARS));
        }
        while self.n_vars() < n {
            self.new_var(self.conf.initial_phase, true)?;
        }
        Ok(())
    }

    fn ensure_var(&mut self, v: Var) -> Result<(), SolverError> {
        self.ensure_vars(v.saturating_add(1))
    }

    /// Sets whether the variable may be picked as a decision.
    pub fn set_decision_var(&mut self, v: Var, decision: bool) -> Result<(), SolverError> {
        self.ensure_var(v)?;
        self.order.set_decision(v, decision);
        Ok(())
    }

    /// Adds a permanent clause. Returns false if the clauses are now unsatisfiable at level 0.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<bool, SolverError> {
        debug_assert_eq!(self.decision_level(), 0);
        for l in lits {
            self.ensure_var(l.var())?;
        }
        if !self.ok {
            return Ok(false);
        }

        // Sort so duplicates and complementary literals end up next to each other.
        let mut ps = lits.to_vec();
        ps.sort_unstable();
        let mut j = 0;
        let mut prev: Option<Lit> = None;
        for i in 0..ps.len() {
            let l = ps[i];
            let val = self.value(l);
            if val == LBool::True || prev == Some(!l) {
                // Satisfied at level 0, or tautology
                return Ok(true);
            } else if val != LBool::False && prev != Some(l) {
                prev = Some(l);
                ps[j] = l;
                j += 1;
            }
        }
        ps.truncate(j);

        match ps.len() {
            0 => {
                self.ok = false;
                Ok(false)
            }
            1 => {
                self.unchecked_enqueue(ps[0], None);
                self.units.push(ps[0]);
                self.ok = self.propagate().is_none();
                Ok(self.ok)
            }
            _ => {
                let ck = self.ca.create_clause(ps, false)?;
                self.clauses.push(ck);
                self.attach(ck);
                Ok(true)
            }
        }
    }

    /// Adds a clause given as DIMACS literals.
    pub fn add_clause_dimacs(&mut self, lits: &[i64]) -> Result<bool, SolverError> {
        let lits = lits
            .iter()
            .map(|l| Lit::from_dimacs(*l))
            .collect::<Result<Vec<_>, _>>()?;
        self.add_clause(&lits)
    }

    /// Adds the constraint "at most k of lits are true". Returns false if the clauses are now
    /// unsatisfiable at level 0.
    pub fn add_at_most(&mut self, lits: &[Lit], k: usize) -> Result<bool, SolverError> {
        debug_assert_eq!(self.decision_level(), 0);
        for l in lits {
            self.ensure_var(l.var())?;
        }
        let mut ps = lits.to_vec();
        ps.sort_unstable();
        if let Some(w) = ps.windows(2).find(|w| w[0] == w[1]) {
            return Err(SolverError::DuplicateLiteral(w[0].to_dimacs()));
        }
        if !self.ok {
            return Ok(false);
        }

        let mut k = k as i64;
        let mut kept: Vec<Lit> = Vec::with_capacity(ps.len());
        for l in ps {
            match self.value(l) {
                LBool::True => k -= 1,
                LBool::False => (),
                LBool::Undef => {
                    // Exactly one of l and !l is true.
                    if kept.last() == Some(&!l) {
                        kept.pop();
                        k -= 1;
                    } else {
                        kept.push(l);
                    }
                }
            }
        }
        if k < 0 {
            self.ok = false;
            return Ok(false);
        }
        let k = k as usize;
        if k >= kept.len() {
            return Ok(true);
        }
        if k == 0 {
            for l in kept {
                self.unchecked_enqueue(!l, None);
                self.units.push(!l);
            }
            self.ok = self.propagate().is_none();
            return Ok(self.ok);
        }

        let n_watchers = kept.len() - k + 1;
        let ck = self.ca.create_clause(kept, false)?;
        self.ca[ck].at_most_watchers = Some(n_watchers);
        self.clauses.push(ck);
        self.attach(ck);
        Ok(true)
    }

    /// Queues an assumption for the next solve call.
    pub fn add_assumption(&mut self, l: Lit) -> Result<(), SolverError> {
        self.ensure_var(l.var())?;
        self.queued_assumptions.push(l);
        Ok(())
    }

    pub fn solve(&mut self) -> Result<SolveResult, SolverError> {
        self.solve_limited(&[], &mut NoCallback)
    }

    pub fn solve_with_assumptions(&mut self, assumptions: &[Lit]) -> Result<SolveResult, SolverError> {
        self.solve_limited(assumptions, &mut NoCallback)
    }

    pub fn solve_with_callback(
        &mut self,
        cb: &mut dyn SolverCallback,
    ) -> Result<SolveResult, SolverError> {
        self.solve_limited(&[], cb)
    }

    /// Solves under the queued assumptions followed by the given ones, reporting progress to
    /// the callback. The solver is back at level 0 afterwards, whatever the result.
    pub fn solve_limited(
        &mut self,
        assumptions: &[Lit],
        cb: &mut dyn SolverCallback,
    ) -> Result<SolveResult, SolverError> {
        let mut assumps = mem::take(&mut self.queued_assumptions);
        assumps.extend_from_slice(assumptions);
        for l in &assumps {
            self.ensure_var(l.var())?;
        }

        self.model = None;
        self.stats.solves += 1;
        if !cb.should_continue(SolverEvent::Started) {
            return Ok(SolveResult::Aborted);
        }
        if !self.ok {
            return Ok(SolveResult::Unsatisfiable(vec![]));
        }

        self.assumptions = assumps;
        self.max_learnts = (self.cd_conf.reduce_first as f64)
            .max(self.clauses.len() as f64 * self.cd_conf.max_learnt_f);
        let res = self.search(cb);
        self.backtrack_to(0);
        self.assumptions.clear();

        let res = match res? {
            SearchResult::Sat(m) => {
                self.model = Some(m.clone());
                SolveResult::Satisfiable(m)
            }
            SearchResult::Unsat(core) => {
                if core.is_empty() {
                    self.ok = false;
                }
                SolveResult::Unsatisfiable(core)
            }
            SearchResult::Aborted => SolveResult::Aborted,
        };
        info!(
            "{} after {} conflicts, {} decisions, {} restarts ({} learnts)",
            res,
            self.stats.conflicts,
            self.stats.decisions,
            self.stats.restarts,
            self.learnts.len()
        );
        Ok(res)
    }

    /// Saves the current clause database. Loading the state later removes everything added or
    /// learnt since.
    pub fn save(&mut self) -> SolverState {
        debug_assert_eq!(self.decision_level(), 0);
        let state = SolverState {
            owner: self.states.owner(),
            id: self.states.push(),
            ok: self.ok,
            n_vars: self.n_vars(),
            n_clauses: self.clauses.len(),
            n_units: self.units.len(),
        };
        debug!("Saved state {:?}", state);
        state
    }

    /// Rolls back to the given state, which must be the most recently saved one still valid.
    pub fn load(&mut self, state: &SolverState) -> Result<(), SolverError> {
        self.states.pop(state.owner, state.id)?;
        self.complete_backtrack();
        self.ok = state.ok;
        self.model = None;
        self.simp_db_assigns = None;

        // Permanent clauses added after the state, and learnts learnt after it.
        let n_clauses = state.n_clauses.min(self.clauses.len());
        let mut removed = self.clauses.split_off(n_clauses);
        let (keep, stale): (Vec<_>, Vec<_>) = mem::take(&mut self.learnts)
            .into_iter()
            .partition(|ck| self.ca[*ck].learnt_on_state.map_or(true, |s| s <= state.id));
        self.learnts = keep;
        removed.extend(stale);
        for ck in removed {
            if let Some(c) = self.ca.free(ck) {
                self.track(&c, false);
            }
        }

        // Variables created after the state.
        let n_vars = state.n_vars.min(self.n_vars());
        self.assigned.truncate(n_vars);
        self.polarity.truncate(n_vars);
        self.reasons.truncate(n_vars);
        self.seen.truncate(n_vars);
        self.order.truncate(n_vars);
        self.watches.truncate(n_vars);
        let ca = &self.ca;
        self.watches.retain(|w| ca.contains(w.ck));
        self.queued_assumptions.retain(|l| l.var() < n_vars);

        self.units.truncate(state.n_units);
        for i in 0..self.units.len() {
            if !self.ok {
                break;
            }
            let u = self.units[i];
            match self.value(u) {
                LBool::True => (),
                LBool::False => self.ok = false,
                LBool::Undef => {
                    self.unchecked_enqueue(u, None);
                    self.ok = self.propagate().is_none();
                }
            }
        }
        self.n_deletable = self.learnts.iter().filter(|ck| self.ca[**ck].can_be_del).count();
        debug!(
            "Loaded state {}: {} vars, {} clauses, {} learnts, {} units",
            state.id,
            n_vars,
            self.clauses.len(),
            self.learnts.len(),
            self.units.len()
        );
        Ok(())
    }

    /// The main search procedure of the CDCL algorithm.
    fn search(&mut self, cb: &mut dyn SolverCallback) -> Result<SearchResult, SolverError> {
        loop {
            if let Some(confl) = self.propagate() {
                self.stats.conflicts += 1;
                self.rs_conf.conflicts_since_restart += 1;
                if self.decision_level() == 0 {
                    return Ok(SearchResult::Unsat(vec![]));
                }
                trace!("Conflict at level {}: {:?}", self.decision_level(), self.ca[confl]);
                self.block_restart();

                let (learnt, bt_level, lbd) = self.analyze(confl);
                self.rs_conf.lbd_win.push(lbd as u64);
                self.rs_conf.sum_lbd += lbd as f64;
                self.rs_conf.n_lbd += 1;
                self.backtrack_to(bt_level);
                self.learn(learnt, lbd)?;
                self.order.decay();
                self.cla_inc *= self.cd_conf.f;

                if !cb.should_continue(SolverEvent::Conflict) {
                    return Ok(SearchResult::Aborted);
                }
            } else {
                if self.decision_level() == 0 {
                    self.simplify();
                }
                if self.should_restart() {
                    self.restart();
                    if !cb.should_continue(SolverEvent::Restart) {
                        return Ok(SearchResult::Aborted);
                    }
                    continue;
                }
                if self.n_deletable as f64 >= self.max_learnts {
                    self.reduce_db();
                    self.max_learnts *= self.cd_conf.learnt_growth;
                }

                // Re-establish the assumptions, one level each.
                let mut next = None;
                while (self.decision_level() as usize) < self.assumptions.len() {
                    let p = self.assumptions[self.decision_level() as usize];
                    match self.value(p) {
                        LBool::True => self.trail.new_decision_level(),
                        LBool::False => {
                            let core = self.analyze_final(p);
                            debug!("Assumption {} falsified, core of {}", p, core.len());
                            return Ok(SearchResult::Unsat(core));
                        }
                        LBool::Undef => {
                            next = Some(p);
                            break;
                        }
                    }
                }

                let (next, decision) = match next {
                    Some(p) => (p, false),
                    None => match self.pick_branch_lit() {
                        Some(l) => (l, true),
                        None => return Ok(SearchResult::Sat(self.current_model())),
                    },
                };
                self.trail.new_decision_level();
                self.unchecked_enqueue(next, None);
                if decision {
                    self.stats.decisions += 1;
                    trace!("Deciding lit {} at level {}", next, self.decision_level());
                    if !cb.should_continue(SolverEvent::Decision(next)) {
                        return Ok(SearchResult::Aborted);
                    }
                }
            }
        }
    }

    fn current_model(&self) -> Model {
        Model::new(self.assigned.iter().map(|a| *a == LBool::True).collect())
    }

    /// Attaches the learnt clause and asserts its first literal.
    fn learn(&mut self, learnt: Vec<Lit>, lbd: LBD) -> Result<(), SolverError> {
        let asserting = learnt[0];
        if learnt.len() == 1 {
            self.unchecked_enqueue(asserting, None);
            self.units.push(asserting);
            return Ok(());
        }
        let ck = self.ca.create_clause(learnt, true)?;
        {
            let c = &mut self.ca[ck];
            c.lbd = lbd;
            c.learnt_on_state = Some(self.states.next_id());
        }
        self.learnts.push(ck);
        self.n_deletable += 1;
        self.attach(ck);
        self.bump_clause(ck);
        self.unchecked_enqueue(asserting, Some(ck));
        Ok(())
    }

    pub(super) fn unchecked_enqueue(&mut self, l: Lit, ck: Option<ClauseKey>) {
        debug_assert_eq!(self.value(l), LBool::Undef);
        let v = l.var();
        self.assigned[v] = LBool::from_sign(l.sign());
        self.reasons[v] = Reason {
            ck,
            dl: self.decision_level(),
        };
        self.trail.push(l);
    }

    /// Registers the clause's watchers.
    fn attach(&mut self, ck: ClauseKey) {
        let c = &self.ca[ck];
        match c.at_most_watchers {
            Some(n) => {
                for &l in &c.lits[..n] {
                    self.watches.add_watcher(l, Watcher::at_most(ck));
                }
            }
            None => {
                self.watches.add_watcher(!c[0], Watcher::new(ck, c[1]));
                self.watches.add_watcher(!c[1], Watcher::new(ck, c[0]));
            }
        }
        let (learnt, len) = (c.learnt, c.len());
        self.track_counts(learnt, len, true);
    }

    fn detach(&mut self, ck: ClauseKey) {
        let c = &self.ca[ck];
        match c.at_most_watchers {
            Some(n) => {
                for &l in &c.lits[..n] {
                    self.watches.remove_watcher(l, ck);
                }
            }
            None => {
                self.watches.remove_watcher(!c[0], ck);
                self.watches.remove_watcher(!c[1], ck);
            }
        }
        let (learnt, len) = (c.learnt, c.len());
        self.track_counts(learnt, len, false);
    }

    fn track(&mut self, c: &Clause, add: bool) {
        self.track_counts(c.learnt, c.len(), add);
    }

    fn track_counts(&mut self, learnt: bool, len: usize, add: bool) {
        let (n, lits) = if learnt {
            (&mut self.stats.n_learnts, &mut self.stats.n_learnt_lits)
        } else {
            (&mut self.stats.n_clauses, &mut self.stats.n_clause_lits)
        };
        if add {
            *n += 1;
            *lits += len as u64;
        } else {
            *n -= 1;
            *lits -= len as u64;
        }
    }

    /// Whether the clause is the reason of an assigned literal: its first literal for a normal
    /// clause, any of the implied ones for an at-most constraint.
    fn locked(&self, ck: ClauseKey) -> bool {
        let c = &self.ca[ck];
        if c.is_at_most() {
            return c.lits.iter().any(|l| self.implied_by(*l, ck));
        }
        let l0 = c[0];
        self.reasons[l0.var()].ck == Some(ck) && self.value(l0) == LBool::True
    }

    fn implied_by(&self, l: Lit, ck: ClauseKey) -> bool {
        self.reasons[l.var()].ck == Some(ck) && self.value(l) != LBool::Undef
    }

    /// Detaches and frees the clause. Only level 0 literals may still depend on it: they keep
    /// their value and become units, so that loading a state replays them.
    fn remove_clause(&mut self, ck: ClauseKey) {
        self.detach(ck);
        if self.locked(ck) {
            for i in 0..self.ca[ck].len() {
                let l = self.ca[ck][i];
                if !self.implied_by(l, ck) {
                    continue;
                }
                let v = l.var();
                debug_assert_eq!(self.level(v), 0);
                self.reasons[v].ck = None;
                self.units.push(Lit::new(v, self.assigned[v] == LBool::False));
            }
        }
        self.ca.free(ck);
    }

    /// Propagates every enqueued literal. Returns the conflicting clause, if any.
    pub(super) fn propagate(&mut self) -> Option<ClauseKey> {
        let mut confl = None;
        while let Some(p) = self.trail.get_next_bcp_lit() {
            self.stats.propagations += 1;
            let false_lit = !p;
            let mut ws = self.watches.take_watchers(p);
            let (mut i, mut j) = (0, 0);

            'next_watcher: while i < ws.len() {
                let w = ws[i];
                i += 1;
                if let Some(b) = w.blocker {
                    if lit_value(&self.assigned, b) == LBool::True {
                        ws[j] = w;
                        j += 1;
                        continue;
                    }
                }

                if self.ca[w.ck].is_at_most() {
                    match self.propagate_at_most(w.ck, p) {
                        AtMostWatch::Moved => (),
                        AtMostWatch::Keep => {
                            ws[j] = w;
                            j += 1;
                        }
                        AtMostWatch::Conflict => {
                            ws[j] = w;
                            j += 1;
                            confl = Some(w.ck);
                            break;
                        }
                    }
                    continue;
                }

                // Make sure the false literal is lits[1].
                let c = &mut self.ca[w.ck];
                if c[0] == false_lit {
                    c.lits.swap(0, 1);
                }
                debug_assert_eq!(c[1], false_lit);

                // If 0th watch is true, clause is already satisfied.
                let first = c[0];
                let nw = Watcher::new(w.ck, first);
                if Some(first) != w.blocker && lit_value(&self.assigned, first) == LBool::True {
                    ws[j] = nw;
                    j += 1;
                    continue;
                }

                // Look for new watch
                for k in 2..c.len() {
                    if lit_value(&self.assigned, c[k]) != LBool::False {
                        c.lits.swap(1, k);
                        self.watches.add_watcher(!c[1], nw);
                        continue 'next_watcher;
                    }
                }

                // Did not find watch; clause is unit under assignment, or conflicting.
                ws[j] = nw;
                j += 1;
                if lit_value(&self.assigned, first) == LBool::False {
                    confl = Some(w.ck);
                    break;
                }
                self.unchecked_enqueue(first, Some(w.ck));
            }

            // Keep the watchers we did not get to.
            while i < ws.len() {
                ws[j] = ws[i];
                j += 1;
                i += 1;
            }
            ws.truncate(j);
            self.watches.set_watchers(p, ws);

            if confl.is_some() {
                self.trail.set_bcp_idx_to_trail_head();
                break;
            }
        }
        confl
    }

    /// Handles a watched literal p of an at-most constraint becoming true: move the watch to an
    /// unwatched literal that is not true, or, if every unwatched literal is true, the bound is
    /// reached and the other watched literals must be false.
    fn propagate_at_most(&mut self, ck: ClauseKey, p: Lit) -> AtMostWatch {
        let c = &mut self.ca[ck];
        let n = match c.at_most_watchers {
            Some(n) => n,
            None => unreachable!("not an at-most constraint"),
        };
        let q = match c.lits[..n].iter().position(|l| *l == p) {
            Some(q) => q,
            None => panic!("{} is watched but not a watcher of {:?}", p, c),
        };

        for k in n..c.len() {
            if lit_value(&self.assigned, c[k]) != LBool::True {
                c.lits.swap(q, k);
                self.watches.add_watcher(c[q], Watcher::at_most(ck));
                return AtMostWatch::Moved;
            }
        }

        let n_true = c.lits[..n]
            .iter()
            .filter(|l| lit_value(&self.assigned, **l) == LBool::True)
            .count();
        if n_true > 1 {
            return AtMostWatch::Conflict;
        }
        let implied = c.lits[..n]
            .iter()
            .filter(|l| lit_value(&self.assigned, **l) == LBool::Undef)
            .map(|l| !*l)
            .collect::<Vec<_>>();
        for l in implied {
            self.unchecked_enqueue(l, Some(ck));
        }
        AtMostWatch::Keep
    }

    /// Pops every level above the given one.
    pub(super) fn backtrack_to(&mut self, level: DecisionLevel) {
        for l in self.trail.backtrack_to(level) {
            let v = l.var();
            self.assigned[v] = LBool::Undef;
            if self.conf.save_phases {
                self.polarity[v] = !l.sign();
            }
            self.order.insert(v);
        }
    }

    /// Unassigns everything, level 0 included.
    fn complete_backtrack(&mut self) {
        for l in self.trail.clear() {
            self.assigned[l.var()] = LBool::Undef;
        }
        for v in 0..self.n_vars() {
            self.reasons[v] = Reason::default();
            self.order.insert(v);
        }
    }

    fn pick_branch_lit(&mut self) -> Option<Lit> {
        let mut next = None;
        if self.dh_conf.random_var_freq > 0. && self.rng.gen::<f64>() < self.dh_conf.random_var_freq
        {
            let n = self.rng.gen::<u32>() as usize;
            if let Some(v) = self.order.pop_nth(n) {
                if self.assigned[v] == LBool::Undef && self.order.is_decision(v) {
                    self.stats.rand_decisions += 1;
                    next = Some(v);
                }
            }
        }
        let v = match next {
            Some(v) => v,
            None => loop {
                let v = self.order.pop_max()?;
                if self.assigned[v] == LBool::Undef && self.order.is_decision(v) {
                    break v;
                }
            },
        };
        let pol = if self.dh_conf.random_pol {
            self.rng.gen_bool(0.5)
        } else {
            self.polarity[v]
        };
        Some(Lit::new(v, !pol))
    }

    /// Glucose: a conflict on a much longer trail than usual postpones the next restart.
    fn block_restart(&mut self) {
        let rs = &mut self.rs_conf;
        if rs.policy != RestartPolicy::Glucose {
            return;
        }
        let trail_len = self.trail.len() as u64;
        rs.trail_win.push(trail_len);
        if self.stats.conflicts > rs.blocking_min_conflicts
            && rs.lbd_win.is_full()
            && trail_len as f64 > rs.r * rs.trail_win.avg()
        {
            rs.lbd_win.clear();
            self.stats.blocked_restarts += 1;
            debug!("Blocked restart at {} conflicts", self.stats.conflicts);
        }
    }

    fn should_restart(&self) -> bool {
        let rs = &self.rs_conf;
        match rs.policy {
            RestartPolicy::Glucose => {
                rs.lbd_win.is_full() && rs.lbd_win.avg() * rs.k > rs.avg_lbd()
            }
            RestartPolicy::Luby | RestartPolicy::Geometric => rs
                .conflict_budget()
                .map_or(false, |b| rs.conflicts_since_restart >= b),
            RestartPolicy::Never => false,
        }
    }

    fn restart(&mut self) {
        self.backtrack_to(0);
        self.rs_conf.lbd_win.clear();
        self.rs_conf.n_restarts += 1;
        self.rs_conf.conflicts_since_restart = 0;
        self.stats.restarts += 1;
        debug!(
            "Restart {} after {} conflicts ({} learnts)",
            self.stats.restarts,
            self.stats.conflicts,
            self.learnts.len()
        );
    }

    /// Increases the learnt clause's activity, rescaling every learnt's if needed.
    pub(super) fn bump_clause(&mut self, ck: ClauseKey) {
        if self.ca[ck].bump_activity(self.cla_inc, self.cd_conf.rescale_lim) {
            let f = self.cd_conf.rescale_f;
            for ck in &self.learnts {
                self.ca[*ck].act *= f;
            }
            self.cla_inc *= f;
        }
    }

    /// Deletes the worst learnt clauses; clauses that are binary, glue (LBD <= 2), locked, or
    /// protected survive.
    fn reduce_db(&mut self) {
        let ca = &self.ca;
        let order = &self.cd_conf.sort_order;
        self.learnts
            .sort_by(|x, y| compare_learnts(&ca[*x], &ca[*y], order));

        let n = self.learnts.len();
        let mut limit = ((1. - self.cd_conf.keep_f) * n as f64) as usize;
        let mut kept = Vec::with_capacity(n);
        for (i, ck) in mem::take(&mut self.learnts).into_iter().enumerate() {
            let c = &self.ca[ck];
            let protected = !c.can_be_del;
            let deletable = c.lbd > 2 && c.len() > 2 && c.can_be_del && !self.locked(ck);
            if i < limit && deletable {
                self.remove_clause(ck);
                self.stats.deletions += 1;
            } else {
                if protected {
                    limit += 1;
                }
                self.ca[ck].can_be_del = true;
                kept.push(ck);
            }
        }
        self.learnts = kept;
        self.n_deletable = self.learnts.len();
        self.stats.reductions += 1;
        debug!(
            "Reduced learnts from {} to {} (limit now {:.0})",
            n,
            self.learnts.len(),
            self.max_learnts * self.cd_conf.learnt_growth
        );
    }

    /// Removes clauses satisfied at level 0. Skipped while a state is saved, since states
    /// refer to clause positions.
    fn simplify(&mut self) {
        debug_assert_eq!(self.decision_level(), 0);
        if !self.conf.remove_satisfied
            || !self.states.is_empty()
            || self.simp_db_assigns == Some(self.trail.len())
        {
            return;
        }

        let satisfied = |ca: &ClauseAllocator, assigned: &[LBool], ck: &ClauseKey| {
            let c = &ca[*ck];
            !c.is_at_most() && c.lits.iter().any(|l| lit_value(assigned, *l) == LBool::True)
        };
        for learnt in [true, false] {
            let list = if learnt { &self.learnts } else { &self.clauses };
            let (sat, unsat): (Vec<_>, Vec<_>) = list
                .iter()
                .copied()
                .partition(|ck| satisfied(&self.ca, &self.assigned, ck));
            for ck in sat {
                self.remove_clause(ck);
            }
            if learnt {
                self.learnts = unsat;
            } else {
                self.clauses = unsat;
            }
        }
        self.n_deletable = self.learnts.iter().filter(|ck| self.ca[**ck].can_be_del).count();
        self.simp_db_assigns = Some(self.trail.len());
    }
}

/// Orders learnts worst first, by the configured keys.
fn compare_learnts(x: &Clause, y: &Clause, order: &[DeletionSortOption]) -> Ordering {
    order.iter().fold(Ordering::Equal, |acc, opt| {
        acc.then_with(|| match opt {
            DeletionSortOption::LBD => y.lbd.cmp(&x.lbd),
            DeletionSortOption::Activity => x.act.total_cmp(&y.act),
            DeletionSortOption::ClauseSize => y.len().cmp(&x.len()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::config::ClauseMinimization;

    fn lits(ls: &[i64]) -> Vec<Lit> {
        ls.iter().map(|l| Lit::from_dimacs(*l).unwrap()).collect()
    }

    /// Checks the watched-literal invariants after propagation without conflict.
    fn check_watches(s: &CDCLSolver) {
        for (ck, c) in s.ca.iter() {
            match c.at_most_watchers {
                Some(n) => {
                    for l in &c.lits[..n] {
                        assert_eq!(
                            s.watches.get_watchers(*l).iter().filter(|w| w.ck == ck).count(),
                            1
                        );
                    }
                }
                None => {
                    for l in &c.lits[..2] {
                        assert_eq!(
                            s.watches.get_watchers(!*l).iter().filter(|w| w.ck == ck).count(),
                            1,
                            "{:?}",
                            c
                        );
                    }
                    // A false watch means the other one is true.
                    if s.value(c[0]) == LBool::False || s.value(c[1]) == LBool::False {
                        assert!(c.lits.iter().any(|l| s.value(*l) == LBool::True), "{:?}", c);
                    }
                }
            }
        }
    }

    #[test]
    fn propagation_is_fifo() {
        let mut s = CDCLSolver::default();
        s.add_clause(&lits(&[-1, 2])).unwrap();
        s.add_clause(&lits(&[-1, 3])).unwrap();
        s.add_clause(&lits(&[-2, 4])).unwrap();
        s.add_clause(&lits(&[-3, -4, 5])).unwrap();
        assert!(s.add_clause(&lits(&[1])).unwrap());
        assert_eq!(s.trail.trail, lits(&[1, 2, 3, 4, 5]));
        assert_eq!(s.value(Lit::positive(4)), LBool::True);
        check_watches(&s);
    }

    #[test]
    fn conflict_keeps_remaining_watchers() {
        let mut s = CDCLSolver::default();
        s.add_clause(&lits(&[-1, 2])).unwrap();
        s.add_clause(&lits(&[-1, -2])).unwrap();
        s.add_clause(&lits(&[-1, 3, 4])).unwrap();
        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(0), None);
        assert!(s.propagate().is_some());
        assert!(s.trail.bcp_idx_at_end());
        // Every clause is still watched exactly twice.
        let n: usize = (0..s.n_vars())
            .flat_map(|v| [Lit::positive(v), Lit::negative(v)])
            .map(|l| s.watches.get_watchers(l).len())
            .sum();
        assert_eq!(n, 6);
        s.backtrack_to(0);
        assert_eq!(s.value(Lit::positive(0)), LBool::Undef);
    }

    #[test]
    fn clause_simplification_at_level_zero() {
        let mut s = CDCLSolver::default();
        assert!(s.add_clause(&lits(&[1, -1, 2])).unwrap());
        assert_eq!(s.n_clauses(), 0);
        assert!(s.add_clause(&lits(&[2, 2, 3])).unwrap());
        assert_eq!(s.ca[s.clauses[0]].len(), 2);
        assert!(s.add_clause(&lits(&[-2])).unwrap());
        // 3 is implied by (2 v 3)
        assert_eq!(s.value(Lit::positive(2)), LBool::True);
        // satisfied
        assert!(s.add_clause(&lits(&[3, 4])).unwrap());
        assert_eq!(s.n_clauses(), 1);
        // falsified literal dropped, then unit
        assert!(s.add_clause(&lits(&[2, 5])).unwrap());
        assert_eq!(s.value(Lit::positive(4)), LBool::True);
        assert!(!s.add_clause(&lits(&[2, -3])).unwrap());
        assert!(!s.is_ok());
    }

    #[test]
    fn at_most_propagates_once_bound_reached() {
        let mut s = CDCLSolver::default();
        assert!(s.add_at_most(&lits(&[1, 2, 3, 4]), 2).unwrap());
        let ck = s.clauses[0];
        assert_eq!(s.ca[ck].at_most_watchers, Some(3));
        check_watches(&s);

        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(0), None);
        assert!(s.propagate().is_none());
        assert_eq!(s.value(Lit::positive(1)), LBool::Undef);
        check_watches(&s);

        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(2), None);
        assert!(s.propagate().is_none());
        assert_eq!(s.value(Lit::positive(1)), LBool::False);
        assert_eq!(s.value(Lit::positive(3)), LBool::False);
        assert_eq!(s.reasons[1].ck, Some(ck));
        check_watches(&s);

        s.backtrack_to(1);
        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(1), None);
        s.unchecked_enqueue(Lit::positive(3), None);
        assert_eq!(s.propagate(), Some(ck));
    }

    #[test]
    fn at_most_level_zero_simplification() {
        let mut s = CDCLSolver::default();
        assert_eq!(
            s.add_at_most(&lits(&[1, 2, 1]), 1),
            Err(SolverError::DuplicateLiteral(1))
        );
        s.add_clause(&lits(&[1])).unwrap();
        // 1 is true, so at most one of 2, 3, -3 remains; 3 and -3 use it up.
        assert!(s.add_at_most(&lits(&[1, 2, 3, -3]), 2).unwrap());
        assert_eq!(s.value(Lit::positive(1)), LBool::False);
        assert_eq!(s.n_clauses(), 0);
        assert!(s.add_at_most(&lits(&[4, 5]), 2).unwrap());
        assert_eq!(s.n_clauses(), 0);
        assert!(!s.add_at_most(&lits(&[1, -2]), 1).unwrap());
    }

    #[test]
    fn simplified_reasons_survive_a_reload() {
        let mut s = CDCLSolver::default();
        s.add_clause(&lits(&[-1, 2])).unwrap();
        s.add_clause(&lits(&[1])).unwrap();
        assert!(s.solve().unwrap().is_sat());
        // (-1 v 2) was satisfied at level 0 and removed; 2 no longer has a reason.
        assert_eq!(s.n_clauses(), 0);
        assert_eq!(s.units, lits(&[1, 2]));

        let st = s.save();
        s.load(&st).unwrap();
        assert_eq!(s.value(Lit::positive(1)), LBool::True);
        assert!(!s.add_clause(&lits(&[-2])).unwrap());
        assert_eq!(s.solve().unwrap(), SolveResult::Unsatisfiable(vec![]));
    }

    #[test]
    fn at_most_lock_follows_its_implications() {
        let mut s = CDCLSolver::default();
        assert!(s.add_at_most(&lits(&[1, 2, 3]), 1).unwrap());
        let ck = s.clauses[0];

        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(1), None);
        assert!(s.propagate().is_none());
        assert_eq!(s.reasons[2].ck, Some(ck));
        assert!(s.locked(ck));
        s.backtrack_to(0);
        // Stale reasons of unassigned variables do not count.
        assert!(!s.locked(ck));

        assert!(s.add_clause(&lits(&[3])).unwrap());
        assert_eq!(s.value(Lit::positive(0)), LBool::False);
        assert!(s.locked(ck));
        s.clauses.clear();
        s.remove_clause(ck);
        assert_eq!(s.units, lits(&[3, -1, -2]));
        assert!(s.reasons.iter().all(|r| r.ck.is_none()));
        assert_eq!(s.value(Lit::positive(1)), LBool::False);
    }

    #[test]
    fn learnt_asserts_and_backjumps() {
        let conf = SolverConfig {
            minimization: ClauseMinimization::None,
            ..Default::default()
        };
        let mut s = CDCLSolver::new(conf);
        s.add_clause(&lits(&[-1, -2, 3])).unwrap();
        s.add_clause(&lits(&[-1, -2, -3])).unwrap();
        s.add_clause(&lits(&[4, 5])).unwrap();

        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(0), None);
        assert!(s.propagate().is_none());
        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(3), None);
        assert!(s.propagate().is_none());
        s.trail.new_decision_level();
        s.unchecked_enqueue(Lit::positive(1), None);
        let confl = s.propagate().unwrap();

        let (learnt, bt, lbd) = s.analyze(confl);
        assert_eq!(learnt, lits(&[-2, -1]));
        assert_eq!(bt, 1);
        assert_eq!(lbd, 2);
        assert!(s.seen.iter().all(|b| !b));

        s.backtrack_to(bt);
        s.learn(learnt, lbd).unwrap();
        assert_eq!(s.value(Lit::positive(1)), LBool::False);
        assert_eq!(s.n_learnts(), 1);
        assert!(s.propagate().is_none());
        check_watches(&s);
    }

    #[test]
    fn reduction_keeps_protected_clauses() {
        let conf = SolverConfig {
            restart_policy: RestartPolicy::Never,
            ..Default::default()
        };
        let mut s = CDCLSolver::new(conf);
        for _ in 0..8 {
            s.new_var(true, true).unwrap();
        }
        let mk = |s: &mut CDCLSolver, ls: &[i64], lbd: LBD, act: f64| {
            let ck = s.ca.create_clause(lits(ls), true).unwrap();
            s.ca[ck].lbd = lbd;
            s.ca[ck].act = act;
            s.learnts.push(ck);
            s.attach(ck);
            ck
        };
        let glue = mk(&mut s, &[1, 2, 3], 2, 0.);
        let bin = mk(&mut s, &[4, 5], 6, 0.);
        let bad = mk(&mut s, &[1, 4, 6], 6, 0.);
        let frozen = mk(&mut s, &[2, 5, 7], 6, 0.);
        let good = mk(&mut s, &[3, 6, 8], 3, 5.);
        s.ca[frozen].can_be_del = false;

        s.reduce_db();
        assert!(!s.ca.contains(bad));
        for ck in [glue, bin, frozen, good] {
            assert!(s.ca.contains(ck));
        }
        assert!(s.ca[frozen].can_be_del);
        assert_eq!(s.n_learnts(), 4);
        check_watches(&s);
    }
}
