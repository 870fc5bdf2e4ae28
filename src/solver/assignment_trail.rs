use super::types::{DecisionLevel, Lit};

// Assignment trail during search and inference.
pub struct AssignmentStack {
    // Stack of Lits
    // Assignment trail (either from decision, or BCP)
    pub trail: Vec<Lit>,
    // lvl -> index into trail
    // Indices for decision level delimiters.
    // (i.e. dl_delim_idxs[lvl - 1] == location of the first literal on level lvl)
    pub dl_delim_idxs: Vec<usize>,
    // Index from which to start BCP
    // - Everything before it has been propagated
    pub bcp_idx: usize,
}

impl AssignmentStack {
    pub fn new(n_vars: usize) -> Self {
        Self {
            trail: Vec::with_capacity(n_vars),
            dl_delim_idxs: Vec::new(),
            bcp_idx: 0,
        }
    }

    // Pushes a lit onto the trail.
    pub fn push(&mut self, l: Lit) {
        self.trail.push(l);
    }

    // Gets the Lit in the trail at the index.
    pub fn get(&self, i: usize) -> Lit {
        self.trail[i]
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    // Gets the Lit at the current BCP index, then increments it.
    pub fn get_next_bcp_lit(&mut self) -> Option<Lit> {
        if self.bcp_idx >= self.trail.len() {
            None
        } else {
            let lit = self.trail[self.bcp_idx];
            self.bcp_idx += 1;
            Some(lit)
        }
    }

    // Sets the BCP index up to the trail head.
    pub fn set_bcp_idx_to_trail_head(&mut self) {
        self.bcp_idx = self.trail.len();
    }

    /// Checks if BCP index at end (i.e. all propagated).
    pub fn bcp_idx_at_end(&self) -> bool {
        self.bcp_idx >= self.trail.len()
    }

    pub fn decision_level(&self) -> DecisionLevel {
        self.dl_delim_idxs.len() as DecisionLevel
    }

    /// Opens a new decision level; the next pushed literal is its first.
    pub fn new_decision_level(&mut self) {
        self.dl_delim_idxs.push(self.trail.len());
    }

    /// Gets the delim index within the trail for the specified level (> 0).
    pub fn dl_delim_idx(&self, dl: DecisionLevel) -> usize {
        self.dl_delim_idxs[dl as usize - 1]
    }

    /// Pops every level above dl and returns the literals that were assigned on them, most
    /// recent first.
    pub fn backtrack_to(&mut self, dl: DecisionLevel) -> Vec<Lit> {
        if self.decision_level() <= dl {
            return vec![];
        }
        let start = self.dl_delim_idx(dl + 1);
        self.dl_delim_idxs.truncate(dl as usize);
        let mut popped = self.trail.split_off(start);
        popped.reverse();
        self.bcp_idx = self.bcp_idx.min(self.trail.len());
        popped
    }

    /// Drops every level, including the assignments made at level 0.
    pub fn clear(&mut self) -> Vec<Lit> {
        self.dl_delim_idxs.clear();
        self.bcp_idx = 0;
        let mut popped = std::mem::take(&mut self.trail);
        popped.reverse();
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_delimiters() {
        let mut t = AssignmentStack::new(8);
        t.push(Lit::positive(0));
        assert_eq!(t.decision_level(), 0);
        t.new_decision_level();
        t.push(Lit::positive(1));
        t.push(Lit::negative(2));
        t.new_decision_level();
        t.push(Lit::positive(3));
        assert_eq!(t.decision_level(), 2);
        assert_eq!(t.dl_delim_idx(1), 1);
        assert_eq!(t.dl_delim_idx(2), 3);
        t.set_bcp_idx_to_trail_head();

        let popped = t.backtrack_to(1);
        assert_eq!(popped, vec![Lit::positive(3)]);
        assert_eq!(t.decision_level(), 1);
        assert_eq!(t.bcp_idx, 3);

        let popped = t.backtrack_to(0);
        assert_eq!(popped, vec![Lit::negative(2), Lit::positive(1)]);
        assert_eq!(t.trail, vec![Lit::positive(0)]);
        assert!(t.backtrack_to(0).is_empty());

        assert_eq!(t.clear(), vec![Lit::positive(0)]);
        assert!(t.is_empty());
    }
}
