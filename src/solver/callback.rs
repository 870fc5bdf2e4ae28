use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use super::types::Lit;

/// Points in the search at which the solver reports progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverEvent {
    /// A solve call is about to search.
    Started,
    /// A decision literal was pushed (not an assumption).
    Decision(Lit),
    /// A conflict was analysed and its learnt clause asserted.
    Conflict,
    /// The solver restarted.
    Restart,
}

/// Progress/cancellation hook. Returning false stops the solve with an aborted result; the
/// solver stays usable.
pub trait SolverCallback {
    fn should_continue(&mut self, event: SolverEvent) -> bool;
}

impl<F> SolverCallback for F
where
    F: FnMut(SolverEvent) -> bool,
{
    fn should_continue(&mut self, event: SolverEvent) -> bool {
        self(event)
    }
}

/// Never stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCallback;

impl SolverCallback for NoCallback {
    fn should_continue(&mut self, _: SolverEvent) -> bool {
        true
    }
}

/// Stops once the shared flag is raised, e.g. from a timeout thread.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl SolverCallback for StopFlag {
    fn should_continue(&mut self, _: SolverEvent) -> bool {
        !self.is_stopped()
    }
}

/// Stops after a fixed number of decisions and/or conflicts.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventLimit {
    pub max_decisions: Option<u64>,
    pub max_conflicts: Option<u64>,
    decisions: u64,
    conflicts: u64,
}

impl EventLimit {
    pub fn decisions(n: u64) -> Self {
        Self {
            max_decisions: Some(n),
            ..Default::default()
        }
    }

    pub fn conflicts(n: u64) -> Self {
        Self {
            max_conflicts: Some(n),
            ..Default::default()
        }
    }
}

impl SolverCallback for EventLimit {
    fn should_continue(&mut self, event: SolverEvent) -> bool {
        match event {
            SolverEvent::Decision(_) => self.decisions += 1,
            SolverEvent::Conflict => self.conflicts += 1,
            _ => (),
        }
        self.max_decisions.map_or(true, |m| self.decisions < m)
            && self.max_conflicts.map_or(true, |m| self.conflicts < m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_count_their_events() {
        let mut lim = EventLimit::decisions(2);
        assert!(lim.should_continue(SolverEvent::Started));
        assert!(lim.should_continue(SolverEvent::Conflict));
        assert!(lim.should_continue(SolverEvent::Decision(Lit::positive(0))));
        assert!(!lim.should_continue(SolverEvent::Decision(Lit::positive(1))));

        let mut lim = EventLimit::conflicts(1);
        assert!(lim.should_continue(SolverEvent::Decision(Lit::positive(0))));
        assert!(!lim.should_continue(SolverEvent::Conflict));
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let mut cb = flag.clone();
        assert!(cb.should_continue(SolverEvent::Restart));
        flag.stop();
        assert!(!cb.should_continue(SolverEvent::Restart));
        flag.reset();
        assert!(cb.should_continue(SolverEvent::Restart));
    }

    #[test]
    fn closures_are_callbacks() {
        let mut seen = vec![];
        let mut cb = |e: SolverEvent| {
            seen.push(e);
            e != SolverEvent::Restart
        };
        assert!(cb.should_continue(SolverEvent::Started));
        assert!(!cb.should_continue(SolverEvent::Restart));
        assert_eq!(seen, vec![SolverEvent::Started, SolverEvent::Restart]);
    }
}
