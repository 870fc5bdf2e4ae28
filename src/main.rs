use std::{path::Path, thread, time::Duration, time::Instant};

use anyhow::{Context, Result};
use cdcl_core::{
    dimacs::parser::DimacsParser, CDCLSolver, RestartPolicy, SolveResult, SolverConfig, StopFlag,
};
use clap::{Parser, ValueEnum};
use crossbeam::{channel, select};
use log::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Restart {
    Glucose,
    Luby,
    Geometric,
    Never,
}

impl From<Restart> for RestartPolicy {
    fn from(r: Restart) -> Self {
        match r {
            Restart::Glucose => RestartPolicy::Glucose,
            Restart::Luby => RestartPolicy::Luby,
            Restart::Geometric => RestartPolicy::Geometric,
            Restart::Never => RestartPolicy::Never,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// File path of instance to parse
    #[arg(short, long)]
    pub file: String,

    /// Restart policy
    #[arg(short, long, value_enum, default_value_t = Restart::Glucose)]
    restart: Restart,

    /// Whether to prefer true in decisions
    #[arg(short, long, default_value_t = false)]
    pub true_pref: bool,

    /// Whether to randomly decide vars (i.e. w/ what freq)
    #[arg(short, long, default_value_t = 0.0)]
    pub var_rand: f64,

    /// Whether to randomize polarity or remember it
    #[arg(short, long, default_value_t = false)]
    pub pol_rand: bool,

    /// Disable phase saving
    #[arg(long, default_value_t = false)]
    pub no_phase_saving: bool,

    /// Seed for random decisions
    #[arg(long)]
    pub seed: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log search progress (repeat for more)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let verbosity = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::builder().filter(None, verbosity).init();
    log::set_max_level(verbosity);

    // Get instance
    let instance = DimacsParser::new(&args.file)?
        .parse()
        .with_context(|| format!("parsing {}", args.file))?;
    info!(
        "Parsed {} vars, {} clauses",
        instance.n_vars, instance.n_clauses
    );

    // Initialize solver
    let mut cfg = SolverConfig {
        verbosity,
        restart_policy: args.restart.into(),
        initial_phase: args.true_pref,
        random_var_freq: args.var_rand,
        random_pol: args.pol_rand,
        save_phases: !args.no_phase_saving,
        ..Default::default()
    };
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    info!("Config: {:#?}", cfg);

    let stop = StopFlag::new();
    let (s, r) = channel::bounded(1);
    let mut cb = stop.clone();
    thread::spawn(move || {
        let mut solver = CDCLSolver::new(cfg);
        let start = Instant::now();
        let res = instance
            .add_to(&mut solver)
            .and_then(|_| solver.solve_with_callback(&mut cb));
        // The receiver only goes away once main is done.
        let _ = s.send((res, start.elapsed(), solver.stats().clone()));
    });

    let timeout = match args.timeout {
        Some(secs) => channel::after(Duration::from_secs(secs)),
        None => channel::never(),
    };
    let (res, elapsed, stats) = select! {
        recv(r) -> msg => msg.context("solver thread died")?,
        recv(timeout) -> _ => {
            info!("Timed out, stopping the solver");
            stop.stop();
            r.recv().context("solver thread died")?
        }
    };
    let res = res?;

    let file = Path::new(&args.file)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(&args.file);
    println!("c [{}] elapsed: {:#?}", file, elapsed);
    println!(
        "c conflicts: {} decisions: {} propagations: {} restarts: {}",
        stats.conflicts, stats.decisions, stats.propagations, stats.restarts
    );
    println!("s {}", res);
    if let SolveResult::Satisfiable(m) = &res {
        let display_str = m
            .to_dimacs()
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        println!("v {} 0", display_str);
    }
    Ok(())
}
