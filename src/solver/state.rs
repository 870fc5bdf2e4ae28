use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::SolverError;

static NEXT_OWNER: AtomicUsize = AtomicUsize::new(0);

/// Snapshot handle returned by `save`. Handles are loaded in reverse order of creation; a
/// loaded handle is spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverState {
    pub(crate) owner: usize,
    pub(crate) id: usize,
    pub(crate) ok: bool,
    pub(crate) n_vars: usize,
    /// Number of permanent clauses (arena clauses, in creation order).
    pub(crate) n_clauses: usize,
    /// Length of the unit log.
    pub(crate) n_units: usize,
}

impl SolverState {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }
}

/// Ids of the saved, not yet loaded, states; the last one is the only loadable one.
#[derive(Debug)]
pub struct StateStack {
    /// Distinguishes handles of different solvers.
    owner: usize,
    valid: Vec<usize>,
    next_id: usize,
}

impl Default for StateStack {
    fn default() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            valid: vec![],
            next_id: 0,
        }
    }
}

impl StateStack {
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Reserves the id for a new state and pushes it.
    pub fn push(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.valid.push(id);
        id
    }

    /// Id the next saved state will get.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    pub fn len(&self) -> usize {
        self.valid.len()
    }

    /// Checks the state is the most recent valid one of this stack, and pops it.
    pub fn pop(&mut self, owner: usize, id: usize) -> Result<(), SolverError> {
        if owner != self.owner {
            return Err(SolverError::InvalidState(id));
        }
        match self.valid.last() {
            Some(&top) if top == id => {
                self.valid.pop();
                Ok(())
            }
            Some(&top) if self.valid.contains(&id) => Err(SolverError::StateOutOfOrder {
                expected: top,
                found: id,
            }),
            _ => Err(SolverError::InvalidState(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_discipline() {
        let mut st = StateStack::default();
        let o = st.owner();
        let a = st.push();
        let b = st.push();
        assert_eq!(
            st.pop(o, a),
            Err(SolverError::StateOutOfOrder {
                expected: b,
                found: a
            })
        );
        assert_eq!(st.pop(o, b), Ok(()));
        assert_eq!(st.pop(o, b), Err(SolverError::InvalidState(b)));
        assert_eq!(st.pop(o, a), Ok(()));
        assert!(st.is_empty());
        assert_eq!(st.next_id(), 2);
        assert_eq!(st.pop(o, 7), Err(SolverError::InvalidState(7)));
    }

    #[test]
    fn foreign_states_are_invalid() {
        let mut st = StateStack::default();
        let other = StateStack::default();
        let a = st.push();
        assert_ne!(st.owner(), other.owner());
        assert_eq!(st.pop(other.owner(), a), Err(SolverError::InvalidState(a)));
        assert_eq!(st.pop(st.owner(), a), Ok(()));
    }
}
