use log;

use super::bounded_queue::BoundedQueue;

// Restart policy configs.
pub const RESTART_FIRST_DEFAULT: u64 = 100;
pub const RESTART_INC_DEFAULT: f64 = 2.0;
pub const LBD_RESTART_FACTOR_DEFAULT: f64 = 0.8;
pub const BLOCKING_RESTART_FACTOR_DEFAULT: f64 = 1.4;
pub const BLOCKING_RESTART_MIN_CONFLICTS_DEFAULT: u64 = 10_000;
pub const LBD_WINDOW_DEFAULT: usize = 50;
pub const TRAIL_WINDOW_DEFAULT: usize = 5000;

// Clause deletion configs.
pub const KEEP_F_DEFAULT: f64 = 0.5;
pub const REDUCE_FIRST_DEFAULT: u64 = 2000;
pub const LBD_FROZEN_DEFAULT: u32 = 30;
pub const DELETION_SORT_ORDER_DEFAULT: [DeletionSortOption; 3] = [
    DeletionSortOption::LBD,
    DeletionSortOption::Activity,
    DeletionSortOption::ClauseSize,
];

// Activity configs; variables use EVSIDS, learnt clauses MiniSat-style activities.
pub const VAR_INC_DEFAULT: f64 = 1.0;
pub const VAR_DECAY_DEFAULT: f64 = 0.95;
pub const CLA_INC_DEFAULT: f64 = 1.0;
pub const CLA_DECAY_DEFAULT: f64 = 0.999;
// Rescale every activity once one exceeds the limit.
const VAR_RESCALE_LIM: f64 = 1e100;
const CLA_RESCALE_LIM: f64 = 1e20;

#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Log filter. Set using `log::set_max_level().`
    pub verbosity: log::LevelFilter,

    /// Variable activity: starting increment, and decay (the increment is divided by it after
    /// every conflict).
    pub var_inc: f64,
    pub var_decay: f64,
    /// Learnt clause activity: starting increment and decay.
    pub cla_inc: f64,
    pub cla_decay: f64,

    /// Restart policy, and the base interval/growth factor of the Luby and geometric ones.
    pub restart_policy: RestartPolicy,
    pub restart_first: u64,
    pub restart_inc: f64,
    /// Glucose: restart when avg(recent LBDs) * factor > avg(all LBDs).
    pub lbd_restart_factor: f64,
    /// Glucose: block the restart when the trail is longer than factor * avg(recent trails).
    pub blocking_restart_factor: f64,
    /// Glucose: number of conflicts before restarts may be blocked.
    pub blocking_restart_min_conflicts: u64,
    /// Glucose: window sizes of recent LBDs and trail sizes.
    pub lbd_window: usize,
    pub trail_window: usize,

    /// Minimum number of deletable learnts before the first reduction.
    pub reduce_first: u64,
    /// Initial scaling factor for max learnt clauses relative to # clauses (default 1/3)
    pub max_learnt_f: f64,
    /// Growth of the learnt limit after each reduction.
    pub learnt_growth: f64,
    /// Learnt clauses whose LBD drops to this during analysis survive the next reduction.
    pub lbd_frozen: u32,
    pub deletion: ClauseDeletionPolicy,

    /// Polarity of a variable's first decision.
    pub initial_phase: bool,
    /// Whether to phase save on backtrack.
    pub save_phases: bool,
    /// Whether to remove satisfied constraint clauses
    pub remove_satisfied: bool,
    pub minimization: ClauseMinimization,

    /// Frequency of random decisions in [0, 1]; 0 keeps decisions deterministic.
    pub random_var_freq: f64,
    /// Whether to pick decision polarities at random.
    pub random_pol: bool,
    /// Seed for random decisions.
    pub seed: u64,
}

impl SolverConfig {
    pub fn opt_config(&self) -> OptConfig {
        OptConfig {
            initial_phase: self.initial_phase,
            save_phases: self.save_phases,
            remove_satisfied: self.remove_satisfied,
            minimization: self.minimization,
        }
    }

    pub fn clause_deletion_config(&self) -> ClauseDeletionConfig {
        ClauseDeletionConfig {
            inc_var: self.cla_inc,
            f: 1. / self.cla_decay,
            rescale_lim: CLA_RESCALE_LIM,
            rescale_f: 1. / CLA_RESCALE_LIM,
            reduce_first: self.reduce_first,
            max_learnt_f: self.max_learnt_f,
            learnt_growth: self.learnt_growth,
            lbd_frozen: self.lbd_frozen,
            keep_f: self.deletion.keep_f.clamp(0., 1.),
            sort_order: self.deletion.sort_order.clone(),
        }
    }

    pub fn restart_config(&self) -> RestartConfig {
        RestartConfig {
            policy: self.restart_policy,
            first: self.restart_first.max(1),
            inc: self.restart_inc,
            k: self.lbd_restart_factor,
            r: self.blocking_restart_factor,
            blocking_min_conflicts: self.blocking_restart_min_conflicts,
            lbd_win: BoundedQueue::new(self.lbd_window),
            trail_win: BoundedQueue::new(self.trail_window),
            sum_lbd: 0.,
            n_lbd: 0,
            n_restarts: 0,
            conflicts_since_restart: 0,
        }
    }

    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            inc_var: self.var_inc,
            f: 1. / self.var_decay,
            rescale_lim: VAR_RESCALE_LIM,
            rescale_f: 1. / VAR_RESCALE_LIM,
            random_var_freq: self.random_var_freq.clamp(0., 1.),
            random_pol: self.random_pol,
            seed: self.seed,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            verbosity: log::max_level(),

            var_inc: VAR_INC_DEFAULT,
            var_decay: VAR_DECAY_DEFAULT,
            cla_inc: CLA_INC_DEFAULT,
            cla_decay: CLA_DECAY_DEFAULT,

            restart_policy: RestartPolicy::Glucose,
            restart_first: RESTART_FIRST_DEFAULT,
            restart_inc: RESTART_INC_DEFAULT,
            lbd_restart_factor: LBD_RESTART_FACTOR_DEFAULT,
            blocking_restart_factor: BLOCKING_RESTART_FACTOR_DEFAULT,
            blocking_restart_min_conflicts: BLOCKING_RESTART_MIN_CONFLICTS_DEFAULT,
            lbd_window: LBD_WINDOW_DEFAULT,
            trail_window: TRAIL_WINDOW_DEFAULT,

            reduce_first: REDUCE_FIRST_DEFAULT,
            max_learnt_f: 1. / 3.,
            learnt_growth: 1.1,
            lbd_frozen: LBD_FROZEN_DEFAULT,
            deletion: ClauseDeletionPolicy {
                keep_f: KEEP_F_DEFAULT,
                sort_order: DELETION_SORT_ORDER_DEFAULT.to_vec(),
            },

            initial_phase: true,
            save_phases: true,
            remove_satisfied: true,
            minimization: ClauseMinimization::Deep,

            random_var_freq: 0.,
            random_pol: false,
            seed: 91648253,
        }
    }
}

// Config options for the restart policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Dynamic restarts driven by recent LBDs, blocked on long trails.
    Glucose,
    /// restart_first * luby(restart_inc, i) conflicts before the i-th restart.
    Luby,
    /// restart_first * restart_inc^i conflicts before the i-th restart.
    Geometric,
    Never,
}

// Learnt clause minimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClauseMinimization {
    None,
    /// Drop literals whose reason only contains literals of the clause.
    Basic,
    /// Drop literals implied by the rest of the clause through any chain of reasons.
    Deep,
}

// Config options for clause deletion.
#[derive(Clone, Debug)]
pub struct ClauseDeletionPolicy {
    // How many clauses to keep [0, 1].
    pub keep_f: f64,
    // Sort keys, most significant first; the worst clauses are deleted.
    pub sort_order: Vec<DeletionSortOption>,
}

// Deletion sort keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionSortOption {
    /// Higher LBD is worse.
    LBD,
    /// Lower activity is worse.
    Activity,
    /// Longer clauses are worse.
    ClauseSize,
}

// Options (i.e. flags, params, idk man) config
#[derive(Clone, Copy, Debug)]
pub struct OptConfig {
    pub initial_phase: bool,
    /// Whether to phase save on backtrack.
    pub save_phases: bool,
    /// Whether to remove satisfied constraint clauses
    pub remove_satisfied: bool,
    pub minimization: ClauseMinimization,
}

// Decision heuristics config.
#[derive(Default, Clone, Copy, Debug)]
pub struct DecisionConfig {
    /// EVSIDS policy values.
    ///
    /// Increase value on increment.
    pub inc_var: f64,
    /// Scaling factor for inc_var.
    pub f: f64,
    /// Limit before we re-scale every variable's activity value by rescale_f
    pub rescale_lim: f64,
    pub rescale_f: f64,

    pub random_var_freq: f64,
    pub random_pol: bool,
    pub seed: u64,
}

// Clause deletion config.
#[derive(Default, Clone, Debug)]
pub struct ClauseDeletionConfig {
    /// Activity based clause deletion policy values.
    ///
    /// Increase value on increment.
    pub inc_var: f64,
    /// Scaling factor for inc_var.
    pub f: f64,
    /// Limit before we re-scale every clause's activity value by rescale_f
    pub rescale_lim: f64,
    pub rescale_f: f64,

    /// Reduction schedule.
    pub reduce_first: u64,
    pub max_learnt_f: f64,
    pub learnt_growth: f64,
    pub lbd_frozen: u32,
    pub keep_f: f64,
    pub sort_order: Vec<DeletionSortOption>,
}

// Restart config, along with the running values the policies need.
pub struct RestartConfig {
    pub policy: RestartPolicy,

    /// Luby/geometric values.
    ///
    /// Base interval and growth factor.
    pub first: u64,
    pub inc: f64,
    pub n_restarts: u64,
    pub conflicts_since_restart: u64,

    /// Glucose related restart values.
    ///
    /// Sliding window of last learnt LBDs.
    pub lbd_win: BoundedQueue,
    /// Sum and count of every learnt LBD, for the global average.
    pub sum_lbd: f64,
    pub n_lbd: u64,
    /// Scale factor to check if recent average too large (i.e. avg_lbd_win * k > avg_lbd)
    pub k: f64,
    /// Sliding window of trail sizes during conflicts.
    pub trail_win: BoundedQueue,
    /// Scale factor to check if the trail is too large (i.e. trail > R * avg_trail_win)
    pub r: f64,
    pub blocking_min_conflicts: u64,
}

impl RestartConfig {
    /// Conflicts allowed before the next restart, for the static policies.
    pub fn conflict_budget(&self) -> Option<u64> {
        match self.policy {
            RestartPolicy::Luby => {
                Some((self.first as f64 * super::util::luby(self.inc, self.n_restarts)) as u64)
            }
            RestartPolicy::Geometric => {
                Some((self.first as f64 * self.inc.powi(self.n_restarts as i32)) as u64)
            }
            RestartPolicy::Glucose | RestartPolicy::Never => None,
        }
    }

    pub fn avg_lbd(&self) -> f64 {
        if self.n_lbd == 0 {
            0.
        } else {
            self.sum_lbd / self.n_lbd as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_configs() {
        let conf = SolverConfig::default();
        let dc = conf.decision_config();
        assert!((dc.f - 1. / 0.95).abs() < 1e-12);
        assert_eq!(dc.rescale_lim, 1e100);
        assert!((dc.rescale_lim * dc.rescale_f - 1.).abs() < 1e-12);
        assert_eq!(dc.random_var_freq, 0.);

        let cdc = conf.clause_deletion_config();
        assert_eq!(cdc.keep_f, 0.5);
        assert_eq!(cdc.rescale_lim, 1e20);
        assert_eq!(cdc.sort_order[0], DeletionSortOption::LBD);

        let rc = conf.restart_config();
        assert_eq!(rc.lbd_win.capacity(), 50);
        assert_eq!(rc.trail_win.capacity(), 5000);
        assert_eq!(rc.conflict_budget(), None);
    }

    #[test]
    fn static_restart_budgets() {
        let conf = SolverConfig {
            restart_policy: RestartPolicy::Luby,
            ..Default::default()
        };
        let mut rc = conf.restart_config();
        let budgets = (0..7)
            .map(|i| {
                rc.n_restarts = i;
                rc.conflict_budget().unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!(budgets, vec![100, 100, 200, 100, 100, 200, 400]);

        rc.policy = RestartPolicy::Geometric;
        rc.n_restarts = 3;
        assert_eq!(rc.conflict_budget(), Some(800));
    }
}
