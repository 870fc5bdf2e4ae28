use std::cmp::Reverse;

use mut_binary_heap::BinaryHeap;

use super::{
    config::DecisionConfig,
    types::{Var, F64},
};

/// Heap priority: highest activity first, lowest index among equal activities.
type Priority = (F64, Reverse<Var>);

/// EVSIDS activities plus the max heap of decision candidates. A variable may be in the heap
/// while assigned; the decision loop skips those lazily.
pub struct VarOrder {
    /// Var -> activity
    acts: Vec<F64>,
    heap: BinaryHeap<Var, Priority>,
    /// Var -> whether currently in the heap (the heap cannot tell us cheaply).
    in_heap: Vec<bool>,
    /// Var -> whether eligible as a decision.
    decision: Vec<bool>,

    inc_var: f64,
    f: f64,
    rescale_lim: f64,
    rescale_f: f64,
}

impl VarOrder {
    pub fn new(n_vars: usize, conf: &DecisionConfig) -> Self {
        Self {
            acts: Vec::with_capacity(n_vars),
            heap: BinaryHeap::with_capacity(n_vars),
            in_heap: Vec::with_capacity(n_vars),
            decision: Vec::with_capacity(n_vars),
            inc_var: conf.inc_var,
            f: conf.f,
            rescale_lim: conf.rescale_lim,
            rescale_f: conf.rescale_f,
        }
    }

    pub fn len(&self) -> usize {
        self.acts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acts.is_empty()
    }

    /// Registers the next variable (index == current length).
    pub fn grow(&mut self, decision: bool) -> Var {
        let v = self.acts.len();
        self.acts.push(F64::default());
        self.in_heap.push(false);
        self.decision.push(decision);
        self.insert(v);
        v
    }

    pub fn activity(&self, v: Var) -> f64 {
        self.acts[v].into_inner()
    }

    pub fn is_decision(&self, v: Var) -> bool {
        self.decision[v]
    }

    pub fn set_decision(&mut self, v: Var, decision: bool) {
        self.decision[v] = decision;
        if decision {
            self.insert(v);
        }
    }

    /// Puts the variable back into the heap, if it is a decision candidate and not there yet.
    pub fn insert(&mut self, v: Var) {
        if self.decision[v] && !self.in_heap[v] {
            self.heap.push(v, (self.acts[v], Reverse(v)));
            self.in_heap[v] = true;
        }
    }

    /// Pops the most active variable in the heap.
    pub fn pop_max(&mut self) -> Option<Var> {
        let (v, _) = self.heap.pop_with_key()?;
        self.in_heap[v] = false;
        Some(v)
    }

    /// Removes and returns one random variable from the heap.
    pub fn pop_nth(&mut self, n: usize) -> Option<Var> {
        let len = self.heap.len();
        if len == 0 {
            return None;
        }
        let v = *self.heap.iter_keys().nth(n % len)?;
        // The heap's own remove() only sifts the moved element up to the hole, so lift v to
        // the top instead and pop it.
        if let Some(mut p) = self.heap.get_mut(&v) {
            *p = (F64::new(f64::INFINITY).ok()?, Reverse(0));
        }
        let (v, _) = self.heap.pop_with_key()?;
        self.in_heap[v] = false;
        Some(v)
    }

    /// Increases the variable's activity, rescaling every activity if the limit is exceeded.
    pub fn bump(&mut self, v: Var) {
        self.acts[v] += self.inc_var;
        if self.acts[v].into_inner() > self.rescale_lim {
            for a in self.acts.iter_mut() {
                *a *= self.rescale_f;
            }
            self.inc_var *= self.rescale_f;
            self.rebuild_heap();
        } else if self.in_heap[v] {
            if let Some(mut p) = self.heap.get_mut(&v) {
                *p = (self.acts[v], Reverse(v));
            }
        }
    }

    pub fn decay(&mut self) {
        self.inc_var *= self.f;
    }

    /// Re-creates the heap from the membership flags, with current activities.
    pub fn rebuild_heap(&mut self) {
        let mut heap = BinaryHeap::with_capacity(self.acts.len());
        for v in 0..self.acts.len() {
            if self.in_heap[v] {
                heap.push(v, (self.acts[v], Reverse(v)));
            }
        }
        self.heap = heap;
    }

    /// Forgets every variable at or above n_vars.
    pub fn truncate(&mut self, n_vars: usize) {
        self.acts.truncate(n_vars);
        self.in_heap.truncate(n_vars);
        self.decision.truncate(n_vars);
        self.rebuild_heap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(n: usize) -> VarOrder {
        let conf = DecisionConfig {
            inc_var: 1.,
            f: 1. / 0.95,
            rescale_lim: 1e100,
            rescale_f: 1e-100,
            ..Default::default()
        };
        let mut vo = VarOrder::new(n, &conf);
        for _ in 0..n {
            vo.grow(true);
        }
        vo
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let mut vo = order(4);
        assert_eq!(vo.pop_max(), Some(0));
        assert_eq!(vo.pop_max(), Some(1));
        vo.insert(0);
        assert_eq!(vo.pop_max(), Some(0));
    }

    #[test]
    fn bump_reorders() {
        let mut vo = order(4);
        vo.bump(2);
        vo.decay();
        vo.bump(3);
        assert!(vo.activity(3) > vo.activity(2));
        assert_eq!(vo.pop_max(), Some(3));
        assert_eq!(vo.pop_max(), Some(2));
        assert_eq!(vo.pop_max(), Some(0));
        // bumped while out of the heap, it comes back with its new activity
        vo.bump(0);
        vo.bump(0);
        vo.insert(0);
        assert_eq!(vo.pop_max(), Some(0));
        assert_eq!(vo.pop_max(), Some(1));
        assert_eq!(vo.pop_max(), None);
    }

    #[test]
    fn rescale_keeps_order() {
        let mut vo = order(3);
        for _ in 0..5000 {
            vo.decay();
            vo.bump(1);
        }
        vo.bump(2);
        assert!(vo.activity(1) < 1e100);
        assert!(vo.activity(1) > vo.activity(2));
        assert_eq!(vo.pop_max(), Some(1));
        assert_eq!(vo.pop_max(), Some(2));
    }

    #[test]
    fn random_pick_leaves_the_rest_ordered() {
        let mut vo = order(4);
        vo.bump(3);
        let v = vo.pop_nth(6).unwrap();
        let w = vo.pop_nth(1).unwrap();
        assert_ne!(v, w);
        let mut rest = vec![];
        while let Some(u) = vo.pop_max() {
            rest.push(u);
        }
        let mut expected = (0..4).filter(|u| *u != v && *u != w).collect::<Vec<_>>();
        // 3 is the most active; the others tie and come out by index.
        expected.sort_by_key(|u| (*u != 3, *u));
        assert_eq!(rest, expected);

        vo.insert(v);
        assert_eq!(vo.pop_nth(5), Some(v));
        assert_eq!(vo.pop_nth(0), None);
    }

    #[test]
    fn non_decision_vars_stay_out() {
        let mut vo = order(2);
        vo.set_decision(0, false);
        assert_eq!(vo.pop_max(), Some(0));
        vo.insert(0);
        assert_eq!(vo.pop_max(), Some(1));
        assert_eq!(vo.pop_max(), None);
        vo.truncate(1);
        assert_eq!(vo.len(), 1);
        vo.set_decision(0, true);
        assert_eq!(vo.pop_max(), Some(0));
    }
}
