use std::mem;

use super::{
    cdcl_solver::CDCLSolver,
    clause::ClauseKey,
    config::ClauseMinimization,
    types::{DecisionLevel, LBool, Lit, Var, LBD},
};

/// Bit of the level in a 32-bit level signature.
#[inline(always)]
fn abstract_level(dl: DecisionLevel) -> u32 {
    1 << (dl & 31)
}

impl CDCLSolver {
    /// Appends the false literals that made the clause a reason or a conflict. For a normal
    /// reason clause the implied literal is lits[0], skipped with `skip_first`; an at-most
    /// constraint contributes the negations of its true literals.
    pub(super) fn antecedents(&self, ck: ClauseKey, skip_first: bool, out: &mut Vec<Lit>) {
        let c = &self.ca[ck];
        if c.is_at_most() {
            out.extend(
                c.lits
                    .iter()
                    .filter(|l| self.value(**l) == LBool::True)
                    .map(|l| !*l),
            );
        } else {
            out.extend_from_slice(&c.lits[usize::from(skip_first)..]);
        }
    }

    /// Conflict analysis. Walks the trail back from the conflict until a single literal of the
    /// current level is left (first UIP), then minimizes the clause.
    ///
    /// Returns the learnt clause (asserting literal first, a literal of the backtrack level
    /// second), the level to backtrack to, and the clause's LBD.
    pub(super) fn analyze(&mut self, confl: ClauseKey) -> (Vec<Lit>, DecisionLevel, LBD) {
        let dl = self.decision_level();
        // Slot 0 holds the asserting literal once found.
        let mut learnt = vec![Lit::default()];
        let mut path_c = 0usize;
        let mut ck = confl;
        let mut skip_first = false;
        let mut idx = self.trail.len();
        let mut ante = mem::take(&mut self.reason_lits);

        let uip = loop {
            self.touch_clause(ck);
            ante.clear();
            self.antecedents(ck, skip_first, &mut ante);
            for &q in &ante {
                let v = q.var();
                if self.seen[v] || self.level(v) == 0 {
                    continue;
                }
                self.order.bump(v);
                self.seen[v] = true;
                if self.level(v) >= dl {
                    path_c += 1;
                    if let Some(rk) = self.reasons[v].ck {
                        if self.ca[rk].learnt {
                            self.last_dl_lits.push(q);
                        }
                    }
                } else {
                    learnt.push(q);
                }
            }

            // Next literal of the current level to look at.
            loop {
                idx -= 1;
                if self.seen[self.trail.get(idx).var()] {
                    break;
                }
            }
            let p = self.trail.get(idx);
            self.seen[p.var()] = false;
            path_c -= 1;
            if path_c == 0 {
                break p;
            }
            ck = match self.reasons[p.var()].ck {
                Some(ck) => ck,
                None => panic!("{} is implied at level {} without a reason", p, dl),
            };
            skip_first = true;
        };
        ante.clear();
        self.reason_lits = ante;
        learnt[0] = !uip;

        self.seen_to_clear.clear();
        self.seen_to_clear.extend(learnt[1..].iter().map(|l| l.var()));
        self.stats.max_lits += learnt.len() as u64;
        self.minimize(&mut learnt);
        self.stats.tot_lits += learnt.len() as u64;

        // Find the backtrack level, and put one of its literals second so it gets watched.
        let bt_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level(learnt[i].var()) > self.level(learnt[max_i].var()) {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            self.level(learnt[1].var())
        };

        let lbd = self.compute_lbd(&learnt);
        // Bonus for current level variables propagated by good learnts.
        for l in mem::take(&mut self.last_dl_lits) {
            if let Some(rk) = self.reasons[l.var()].ck {
                if self.ca[rk].lbd < lbd {
                    self.order.bump(l.var());
                }
            }
        }

        for v in self.seen_to_clear.drain(..) {
            self.seen[v] = false;
        }
        (learnt, bt_level, lbd)
    }

    /// Updates a clause taking part in conflict analysis: learnts get bumped and their LBD
    /// refreshed, permanent clauses get marked as used.
    fn touch_clause(&mut self, ck: ClauseKey) {
        if !self.ca[ck].learnt {
            self.ca[ck].seen = true;
            return;
        }
        self.bump_clause(ck);
        if self.ca[ck].lbd <= 2 {
            return;
        }
        let lits = mem::take(&mut self.ca[ck].lits);
        let new_lbd = self.compute_lbd(&lits);
        let lbd_frozen = self.cd_conf.lbd_frozen;
        let c = &mut self.ca[ck];
        c.lits = lits;
        if new_lbd + 1 < c.lbd {
            if new_lbd <= lbd_frozen && c.can_be_del {
                c.can_be_del = false;
                self.n_deletable -= 1;
            }
            c.lbd = new_lbd;
        }
    }

    fn minimize(&mut self, learnt: &mut Vec<Lit>) {
        match self.conf.minimization {
            ClauseMinimization::None => (),
            ClauseMinimization::Deep => {
                let abs = learnt[1..]
                    .iter()
                    .fold(0, |acc, l| acc | abstract_level(self.level(l.var())));
                let mut j = 1;
                for i in 1..learnt.len() {
                    let l = learnt[i];
                    if self.reasons[l.var()].ck.is_none() || !self.lit_redundant(l, abs) {
                        learnt[j] = l;
                        j += 1;
                    }
                }
                learnt.truncate(j);
            }
            ClauseMinimization::Basic => {
                let mut ante = mem::take(&mut self.reason_lits);
                let mut j = 1;
                for i in 1..learnt.len() {
                    let l = learnt[i];
                    let keep = match self.reasons[l.var()].ck {
                        None => true,
                        Some(ck) => {
                            ante.clear();
                            self.antecedents(ck, true, &mut ante);
                            ante.iter().any(|q| {
                                !self.seen[q.var()] && self.level(q.var()) > 0
                            })
                        }
                    };
                    if keep {
                        learnt[j] = l;
                        j += 1;
                    }
                }
                learnt.truncate(j);
                ante.clear();
                self.reason_lits = ante;
            }
        }
    }

    /// Whether p is implied by the other literals of the learnt clause (those marked seen).
    /// Marks what it proves along the way; undoes its marks when it fails.
    fn lit_redundant(&mut self, p: Lit, abs: u32) -> bool {
        self.analyze_stack.clear();
        self.analyze_stack.push(p);
        let top = self.seen_to_clear.len();
        let mut ante = mem::take(&mut self.reason_lits);
        let mut redundant = true;

        'stack: while let Some(l) = self.analyze_stack.pop() {
            let ck = match self.reasons[l.var()].ck {
                Some(ck) => ck,
                None => panic!("{} has no reason during minimization", l),
            };
            ante.clear();
            self.antecedents(ck, true, &mut ante);
            for &q in &ante {
                let v = q.var();
                if self.seen[v] || self.level(v) == 0 {
                    continue;
                }
                if self.reasons[v].ck.is_some()
                    && abstract_level(self.level(v)) & abs != 0
                {
                    self.seen[v] = true;
                    self.analyze_stack.push(q);
                    self.seen_to_clear.push(v);
                } else {
                    for v in self.seen_to_clear.drain(top..) {
                        self.seen[v] = false;
                    }
                    redundant = false;
                    break 'stack;
                }
            }
        }
        ante.clear();
        self.reason_lits = ante;
        redundant
    }

    /// Number of distinct decision levels among the literals.
    pub(super) fn compute_lbd(&mut self, lits: &[Lit]) -> LBD {
        self.perm_flag += 1;
        let mut lbd = 0;
        for l in lits {
            let dl = self.level(l.var()) as usize;
            if dl >= self.perm_diff.len() {
                self.perm_diff.resize(dl + 1, 0);
            }
            if self.perm_diff[dl] != self.perm_flag {
                self.perm_diff[dl] = self.perm_flag;
                lbd += 1;
            }
        }
        lbd
    }

    /// Computes the assumptions responsible for the falsified assumption p: p itself plus
    /// every assumption its negation was derived from.
    pub(super) fn analyze_final(&mut self, p: Lit) -> Vec<Lit> {
        let mut core = vec![p];
        if self.decision_level() == 0 {
            return core;
        }
        let mut ante = mem::take(&mut self.reason_lits);
        self.seen[p.var()] = true;
        let start = self.trail.dl_delim_idx(1);
        for i in (start..self.trail.len()).rev() {
            let x = self.trail.get(i);
            let v: Var = x.var();
            if !self.seen[v] {
                continue;
            }
            match self.reasons[v].ck {
                None => core.push(x),
                Some(ck) => {
                    ante.clear();
                    self.antecedents(ck, true, &mut ante);
                    for q in &ante {
                        if self.level(q.var()) > 0 {
                            self.seen[q.var()] = true;
                        }
                    }
                }
            }
            self.seen[v] = false;
        }
        self.seen[p.var()] = false;
        ante.clear();
        self.reason_lits = ante;
        core
    }
}
