use std::mem;

use super::{
    clause::ClauseKey,
    types::{lits_from_vars, Lit},
    util::swap_remove_by,
};

pub struct WatchList {
    // Literal -> List of Watchers (i.e. clauses in which this Lit is watched)
    occs: Vec<Vec<Watcher>>,
}

impl WatchList {
    // Creates a watch list for n variables.
    pub fn new(n_vars: usize) -> Self {
        Self {
            occs: Vec::with_capacity(lits_from_vars(n_vars)),
        }
    }

    /// Adds the (empty) lists for one more variable.
    pub fn grow(&mut self) {
        self.occs.push(vec![]);
        self.occs.push(vec![]);
    }

    /// Drops the lists of every variable at or above n_vars.
    pub fn truncate(&mut self, n_vars: usize) {
        self.occs.truncate(lits_from_vars(n_vars));
    }

    // Adds a watcher to the literal's watched clauses list.
    pub fn add_watcher(&mut self, l: Lit, w: Watcher) {
        self.occs[l.idx()].push(w);
    }

    /// Removes the watcher of this clause from the literal's list, if it exists. Order within the
    /// list is not preserved.
    pub fn remove_watcher(&mut self, l: Lit, ck: ClauseKey) -> bool {
        swap_remove_by(&mut self.occs[l.idx()], |w| w.ck == ck)
    }

    pub fn get_watchers(&self, l: Lit) -> &[Watcher] {
        &self.occs[l.idx()]
    }

    /// Hands ownership of this specific watchers to the caller. Make sure to put it back with
    /// set_watchers.
    pub fn take_watchers(&mut self, l: Lit) -> Vec<Watcher> {
        mem::take(&mut self.occs[l.idx()])
    }

    pub fn set_watchers(&mut self, l: Lit, ws: Vec<Watcher>) {
        self.occs[l.idx()] = ws;
    }

    /// Drops every watcher whose clause no longer exists.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(&Watcher) -> bool,
    {
        for ws in self.occs.iter_mut() {
            ws.retain(&keep);
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Watcher {
    pub ck: ClauseKey,
    /// Some literal of the clause other than the watched one; if it is true the clause can be
    /// skipped. At-most constraints carry no blocker.
    pub blocker: Option<Lit>,
}

impl Watcher {
    pub fn new(ck: ClauseKey, blocker: Lit) -> Self {
        Self {
            ck,
            blocker: Some(blocker),
        }
    }

    pub fn at_most(ck: ClauseKey) -> Self {
        Self { ck, blocker: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<ClauseKey> {
        let mut sm: SlotMap<ClauseKey, ()> = SlotMap::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    #[test]
    fn remove_by_clause_key_ignores_blocker() {
        let ck = keys(3);
        let mut wl = WatchList::new(2);
        wl.grow();
        wl.grow();
        let l = Lit::negative(1);
        wl.add_watcher(l, Watcher::new(ck[0], Lit::positive(0)));
        wl.add_watcher(l, Watcher::new(ck[1], Lit::positive(0)));
        wl.add_watcher(l, Watcher::at_most(ck[2]));
        // The blocker may have moved since the watcher was added.
        assert!(wl.remove_watcher(l, ck[0]));
        assert!(!wl.remove_watcher(l, ck[0]));
        assert_eq!(wl.get_watchers(l).len(), 2);
        assert_eq!(wl.get_watchers(l)[0].ck, ck[2]);

        wl.truncate(1);
        wl.grow();
        assert!(wl.get_watchers(l).is_empty());
    }
}
