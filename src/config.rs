//! Run configuration and kernel strategy selection.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;

use crate::error::{LifeError, LifeResult};
use crate::grid::{Grid, cell_count};

/// Environment variable consulted when no kernel strategy is configured.
pub const KERNEL_ENV: &str = "TORUS_LIFE_KERNEL";

pub const DEFAULT_ROWS: usize = 2160;
pub const DEFAULT_COLS: usize = 3840;
pub const DEFAULT_ITERATIONS: u64 = 200;
pub const DEFAULT_DENSITY: f64 = 0.5;

/// Which transition implementation advances the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelStrategy {
    /// Sequential scan, the correctness baseline.
    Reference,
    /// Per-cell work-items spread over a rayon pool.
    Parallel,
    /// Upload / dispatch / download through a compute backend session.
    Accelerator,
}

impl KernelStrategy {
    pub const ALL: [KernelStrategy; 3] = [
        KernelStrategy::Reference,
        KernelStrategy::Parallel,
        KernelStrategy::Accelerator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Parallel => "parallel",
            Self::Accelerator => "accelerator",
        }
    }

    /// Strategy named by `TORUS_LIFE_KERNEL`, or `Parallel` when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var(KERNEL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::Parallel)
    }
}

impl fmt::Display for KernelStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for KernelStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" | "ref" | "sequential" => Ok(Self::Reference),
            "parallel" | "par" | "cpu" => Ok(Self::Parallel),
            "accelerator" | "accel" | "device" => Ok(Self::Accelerator),
            other => Err(format!(
                "unknown kernel: {other} (expected reference, parallel, or accelerator)"
            )),
        }
    }
}

/// Configuration for a simulation run.
///
/// `LifeConfig::default()` mirrors a 4K-sized board for 200 generations; the
/// builder methods override individual knobs.
#[derive(Clone, Debug)]
pub struct LifeConfig {
    pub rows: usize,
    pub cols: usize,
    pub iterations: u64,
    /// `None` means read `TORUS_LIFE_KERNEL`, falling back to `Parallel`.
    pub kernel: Option<KernelStrategy>,
    /// Worker threads. `None` means auto-detect from physical cores.
    pub thread_count: Option<usize>,
    /// Hard upper bound on threads regardless of auto-detection.
    pub max_threads: Option<usize>,
    /// RNG seed for the initial board. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Probability that a cell starts alive.
    pub density: f64,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            iterations: DEFAULT_ITERATIONS,
            kernel: None,
            thread_count: None,
            max_threads: None,
            seed: None,
            density: DEFAULT_DENSITY,
        }
    }
}

impl LifeConfig {
    pub fn dimensions(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = n;
        self
    }

    pub fn kernel(mut self, strategy: KernelStrategy) -> Self {
        self.kernel = Some(strategy);
        self
    }

    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn resolved_kernel(&self) -> KernelStrategy {
        self.kernel.unwrap_or_else(KernelStrategy::from_env)
    }

    /// Reject shapes that cannot be allocated and densities outside [0, 1].
    pub fn validate(&self) -> LifeResult<()> {
        cell_count(self.rows, self.cols)?;
        if !(0.0..=1.0).contains(&self.density) {
            return Err(LifeError::Config("density must lie in [0, 1]"));
        }
        Ok(())
    }

    /// Allocate the starting board and fill it at `density`, from `seed` if set.
    pub fn initial_grid(&self) -> LifeResult<Grid> {
        self.validate()?;
        let mut grid = Grid::new(self.rows, self.cols)?;
        match self.seed {
            Some(seed) => {
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                grid.seed_random_with_density(&mut rng, self.density);
            }
            None => grid.seed_random_with_density(&mut rand::rng(), self.density),
        }
        Ok(grid)
    }
}
