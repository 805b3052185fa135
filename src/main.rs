#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use torus_life::config::{DEFAULT_COLS, DEFAULT_DENSITY, DEFAULT_ITERATIONS, DEFAULT_ROWS};
use torus_life::{
    Grid, KernelStrategy, LifeConfig, LifeResult, ReferenceKernel, RunReport, Simulation, kernel,
};

/// Advance a random toroidal Life board and report throughput.
#[derive(Parser, Debug)]
#[command(name = "torus-life", version, about)]
struct Cli {
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: usize,

    #[arg(long, default_value_t = DEFAULT_COLS)]
    cols: usize,

    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u64,

    /// reference | parallel | accelerator (default: $TORUS_LIFE_KERNEL or parallel)
    #[arg(short, long)]
    kernel: Option<KernelStrategy>,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    max_threads: Option<usize>,

    /// Seed for the initial board; omitted means a fresh random board
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that a cell starts alive
    #[arg(long, default_value_t = DEFAULT_DENSITY)]
    density: f64,

    /// Print the board before and after the run
    #[arg(long)]
    show: bool,

    /// Replay the run with the reference kernel and compare final boards
    #[arg(long)]
    check: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> LifeConfig {
        let mut config = LifeConfig::default()
            .dimensions(self.rows, self.cols)
            .iterations(self.iterations)
            .density(self.density);
        if let Some(kernel) = self.kernel {
            config = config.kernel(kernel);
        }
        if let Some(n) = self.threads {
            config = config.thread_count(n);
        }
        if let Some(n) = self.max_threads {
            config = config.max_threads(n);
        }
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        config
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_checked(initial: Grid, final_grid: &Grid, iterations: u64) -> LifeResult<bool> {
    let mut reference = Simulation::new(initial, ReferenceKernel)?;
    let report = reference.run(iterations)?;
    let matched = reference.grid() == final_grid;
    println!(
        "reference: {:.3} ms total, {:.6} ms/iter, pop = {} [{}]",
        report.elapsed.as_secs_f64() * 1000.0,
        report.avg_ms(),
        reference.grid().population(),
        if matched { "MATCH" } else { "MISMATCH" }
    );
    Ok(matched)
}

fn run(cli: &Cli) -> LifeResult<bool> {
    let config = cli.config();
    let initial = config.initial_grid()?;
    let transition = kernel::build(&config)?;
    let strategy = transition.name();

    if cli.show {
        print!("\n{initial}");
    }
    let replay = cli.check.then(|| initial.clone());

    let mut sim = Simulation::new(initial, transition)?;
    let report: RunReport = sim.run(config.iterations)?;

    if cli.show {
        print!("\n{}", sim.grid());
    }
    println!("{report}");
    println!(
        "{strategy}: {:.6} ms/iter, {:.3e} cells/s, pop = {}",
        report.avg_ms(),
        report.cells_per_sec(),
        sim.grid().population()
    );

    match replay {
        Some(initial) => run_checked(initial, sim.grid(), config.iterations),
        None => Ok(true),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("final board differs from the reference kernel");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(%err, "run failed");
            ExitCode::FAILURE
        }
    }
}
