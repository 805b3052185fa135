use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use torus_life::{KernelStrategy, LifeConfig, LifeResult, Simulation, kernel};

/// Time every kernel strategy over a ladder of square board sizes.
#[derive(Parser, Debug, Clone)]
#[command(name = "bench_kernel")]
struct BenchConfig {
    /// Board side lengths to run
    #[arg(long, value_delimiter = ',', default_values_t = [256usize, 512, 1024, 2048])]
    sizes: Vec<usize>,

    #[arg(long, default_value_t = 0.42)]
    density: f64,

    #[arg(long, default_value_t = 3)]
    warmup: u64,

    #[arg(long, default_value_t = 30)]
    iters: u64,

    #[arg(long, default_value_t = 0xA5A5_5EED_7788_1122)]
    seed: u64,

    #[arg(long)]
    threads: Option<usize>,

    /// Skip the sequential reference on boards larger than this side
    #[arg(long, default_value_t = 1024)]
    reference_max: usize,

    /// One JSON object per line instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug)]
struct RunResult {
    total_ms: f64,
    avg_ms: f64,
    population: u64,
}

fn run_strategy(cfg: &BenchConfig, size: usize, strategy: KernelStrategy) -> LifeResult<RunResult> {
    let mut config = LifeConfig::default()
        .dimensions(size, size)
        .density(cfg.density)
        .seed(cfg.seed)
        .kernel(strategy);
    if let Some(t) = cfg.threads {
        config = config.thread_count(t);
    }
    let grid = config.initial_grid()?;
    let mut sim = Simulation::new(grid, kernel::build(&config)?)?;

    if cfg.warmup > 0 {
        sim.run(cfg.warmup)?;
    }
    let report = sim.run(cfg.iters)?;
    Ok(RunResult {
        total_ms: report.elapsed.as_secs_f64() * 1000.0,
        avg_ms: report.avg_ms(),
        population: sim.grid().population(),
    })
}

fn main() -> ExitCode {
    let cfg = BenchConfig::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if !cfg.json {
        println!(
            "{:<12} {:<12} {:>12} {:>12} {:>12}",
            "Grid", "Kernel", "Total(ms)", "Avg(ms)", "Population"
        );
        println!("{}", "-".repeat(64));
    }

    for &size in &cfg.sizes {
        let mut populations = Vec::new();
        for strategy in KernelStrategy::ALL {
            if strategy == KernelStrategy::Reference && size > cfg.reference_max {
                continue;
            }
            let result = match run_strategy(&cfg, size, strategy) {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(%err, size, kernel = %strategy, "benchmark run failed");
                    return ExitCode::FAILURE;
                }
            };
            populations.push(result.population);

            if cfg.json {
                println!(
                    "{{\"size\":{},\"kernel\":\"{}\",\"density\":{},\"warmup\":{},\"iters\":{},\"seed\":{},\"threads\":{},\"total_ms\":{:.6},\"avg_ms\":{:.6},\"population\":{}}}",
                    size,
                    strategy,
                    cfg.density,
                    cfg.warmup,
                    cfg.iters,
                    cfg.seed,
                    cfg.threads.unwrap_or(0),
                    result.total_ms,
                    result.avg_ms,
                    result.population,
                );
            } else {
                println!(
                    "{:<12} {:<12} {:>12.3} {:>12.4} {:>12}",
                    format!("{size}x{size}"),
                    strategy,
                    result.total_ms,
                    result.avg_ms,
                    result.population
                );
            }
        }
        if populations.windows(2).any(|w| w[0] != w[1]) {
            tracing::error!(size, ?populations, "kernels disagree on final population");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
