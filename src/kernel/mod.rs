//! Transition kernels: one contract, several execution strategies.

pub(crate) mod parallel;
pub mod reference;

pub use parallel::ParallelKernel;
pub use reference::ReferenceKernel;

use crate::backend::HostBackend;
use crate::config::{KernelStrategy, LifeConfig};
use crate::error::LifeResult;
use crate::grid::Grid;
use crate::pool::resolve_thread_count;
use crate::session::ExecutionSession;

/// Maps a generation to its successor.
///
/// `step` reads `current` and overwrites all of `next`, which must have the
/// same shape. Implementations never mutate `current`, and every strategy
/// produces bit-identical output for the same input.
pub trait Transition {
    /// Name of this strategy (for logging).
    fn name(&self) -> &'static str;

    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()>;

    /// Freshly allocated successor of `current`.
    fn next_generation(&mut self, current: &Grid) -> LifeResult<Grid> {
        let mut next = Grid::new(current.rows(), current.cols())?;
        self.step(current, &mut next)?;
        Ok(next)
    }
}

impl<T: Transition + ?Sized> Transition for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()> {
        (**self).step(current, next)
    }
}

impl<T: Transition + ?Sized> Transition for &mut T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()> {
        (**self).step(current, next)
    }
}

/// Build the kernel a config asks for.
///
/// The accelerator strategy runs on the in-process [`HostBackend`]; use
/// [`ExecutionSession::new`] directly to drive another backend.
pub fn build(config: &LifeConfig) -> LifeResult<Box<dyn Transition>> {
    config.validate()?;
    let strategy = config.resolved_kernel();
    let threads = resolve_thread_count(config);
    let kernel: Box<dyn Transition> = match strategy {
        KernelStrategy::Reference => Box::new(ReferenceKernel),
        KernelStrategy::Parallel => Box::new(ParallelKernel::with_config(config)?),
        KernelStrategy::Accelerator => {
            let backend = HostBackend::with_threads(threads)?;
            Box::new(ExecutionSession::new(backend, config.rows, config.cols)?)
        }
    };
    tracing::info!(
        kernel = kernel.name(),
        threads,
        rows = config.rows,
        cols = config.cols,
        "transition kernel selected"
    );
    Ok(kernel)
}
