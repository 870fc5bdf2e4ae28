use std::fmt::Debug;
use std::ops::{Index, IndexMut};

use super::{
    error::SolverError,
    types::{DecisionLevel, Lit, LBD},
};
use slotmap::{basic::Iter, new_key_type, SlotMap};

/// Slotmap keys are 32-bit indices; one value is reserved for the null key.
pub const MAX_CLAUSES: usize = (u32::MAX - 1) as usize;

// Note that default is ClauseKey::null()
new_key_type! {
  pub struct ClauseKey;
}

#[derive(Default)]
pub struct ClauseAllocator {
    sm: SlotMap<ClauseKey, Clause>,
}

impl ClauseAllocator {
    pub fn new(n_clauses: usize) -> Self {
        Self {
            sm: SlotMap::with_capacity_and_key(n_clauses),
        }
    }

    // Create a new clause from the provided literals.
    pub fn create_clause(&mut self, lits: Vec<Lit>, learnt: bool) -> Result<ClauseKey, SolverError> {
        if self.sm.len() >= MAX_CLAUSES {
            return Err(SolverError::ClausesExhausted(self.sm.len()));
        }
        Ok(self.sm.insert(Clause::new(lits, learnt)))
    }

    /// Frees the clause's slot. Its key becomes stale, and indexing with it panics.
    pub fn free(&mut self, ck: ClauseKey) -> Option<Clause> {
        self.sm.remove(ck)
    }

    pub fn contains(&self, ck: ClauseKey) -> bool {
        self.sm.contains_key(ck)
    }

    pub fn len(&self) -> usize {
        self.sm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sm.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, ClauseKey, Clause> {
        self.sm.iter()
    }
}

impl Index<ClauseKey> for ClauseAllocator {
    type Output = Clause;
    fn index(&self, index: ClauseKey) -> &Self::Output {
        match self.sm.get(index) {
            Some(c) => c,
            None => panic!("dangling clause key {:?}", index),
        }
    }
}

impl IndexMut<ClauseKey> for ClauseAllocator {
    fn index_mut(&mut self, index: ClauseKey) -> &mut Self::Output {
        match self.sm.get_mut(index) {
            Some(c) => c,
            None => panic!("dangling clause key {:?}", index),
        }
    }
}

#[derive(Default, Clone)]
pub struct Clause {
    pub lits: Vec<Lit>,

    /// LBD (Glucose level)
    pub lbd: LBD,
    /// Activity
    pub act: f64,
    /// Whether clause was learnt
    pub learnt: bool,
    /// Whether the next database reduction may delete this clause. Cleared when a learnt
    /// clause's LBD drops low enough during analysis.
    pub can_be_del: bool,
    /// For at-most-k constraints: the number of watched literals (n - k + 1), which are always
    /// the first ones.
    pub at_most_watchers: Option<usize>,
    /// Set once a permanent clause took part in a conflict.
    pub seen: bool,
    /// Id the next saved state would get when this clause was learnt.
    pub learnt_on_state: Option<usize>,
}

impl Clause {
    /// Create a new clause. Probably don't need to use this yourself, as ClauseAllocator should
    /// handle it for you.
    pub fn new(lits: Vec<Lit>, learnt: bool) -> Self {
        Self {
            lits,
            lbd: 0,
            act: 0.,
            learnt,
            can_be_del: true,
            at_most_watchers: None,
            seen: false,
            learnt_on_state: None,
        }
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    pub fn is_at_most(&self) -> bool {
        self.at_most_watchers.is_some()
    }

    /// Increases the clause's activity. Returns if the new activity exceeds the limit.
    pub fn bump_activity(&mut self, inc: f64, lim: f64) -> bool {
        self.act += inc;
        self.act >= lim
    }
}

impl Debug for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit_str = self
            .lits
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(",");
        match self.at_most_watchers {
            Some(w) => write!(
                f,
                "AtMost {{ k: {}, lits: {} }}",
                self.len() + 1 - w,
                lit_str
            ),
            None => write!(
                f,
                "Clause {{ size: {}, learnt: {}, lbd: {}, lits: {} }}",
                self.len(),
                self.learnt,
                self.lbd,
                lit_str
            ),
        }
    }
}

impl Index<usize> for Clause {
    type Output = Lit;
    fn index(&self, i: usize) -> &Lit {
        &self.lits[i]
    }
}
impl IndexMut<usize> for Clause {
    fn index_mut(&mut self, i: usize) -> &mut Lit {
        &mut self.lits[i]
    }
}

// Record the reason and decision level for an implication (i.e. BCP result), if exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reason {
    // Slot key for clause (if exists; e.g. for decisions and units, ck == None)
    pub ck: Option<ClauseKey>,
    // Decision level
    pub dl: DecisionLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_keys_are_stale() {
        let mut ca = ClauseAllocator::new(4);
        let a = ca
            .create_clause(vec![Lit::positive(0), Lit::positive(1)], false)
            .unwrap();
        let b = ca
            .create_clause(vec![Lit::negative(0), Lit::positive(2)], true)
            .unwrap();
        assert_eq!(ca.len(), 2);
        assert!(ca[b].learnt);
        assert!(ca.free(a).is_some());
        assert!(!ca.contains(a));
        assert!(ca.contains(b));
        // Reusing the slot must not revive the old key.
        let c = ca
            .create_clause(vec![Lit::positive(3), Lit::positive(4)], false)
            .unwrap();
        assert!(!ca.contains(a));
        assert_eq!(ca[c][0], Lit::positive(3));
    }

    #[test]
    fn activity_bump_reports_limit() {
        let mut c = Clause::new(vec![Lit::positive(0), Lit::positive(1)], true);
        assert!(!c.bump_activity(1.0, 10.0));
        assert!(c.bump_activity(9.0, 10.0));
    }
}
