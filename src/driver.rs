//! Simulation driver.
//!
//! Holds a two-grid arena and ping-pongs between the slots: each step the
//! kernel reads the current slot and fills the other, then the index flips.
//! A failed step leaves the current slot untouched and aborts the run.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::LifeResult;
use crate::grid::Grid;
use crate::kernel::Transition;

/// Outcome of a timed run, handed to the reporting layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunReport {
    pub elapsed: Duration,
    pub rows: usize,
    pub cols: usize,
    pub iterations: u64,
}

impl RunReport {
    pub fn avg_ms(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1000.0 / self.iterations as f64
    }

    /// Cell updates per second over the whole run.
    pub fn cells_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.rows as f64 * self.cols as f64 * self.iterations as f64) / secs
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time elapsed: {:.6}s   ({}x{}, {} iterations)",
            self.elapsed.as_secs_f64(),
            self.rows,
            self.cols,
            self.iterations
        )
    }
}

pub struct Simulation<T: Transition> {
    buffers: [Grid; 2],
    current: usize,
    kernel: T,
    generation: u64,
}

impl<T: Transition> Simulation<T> {
    /// Take ownership of the starting grid and allocate its twin.
    pub fn new(grid: Grid, kernel: T) -> LifeResult<Self> {
        let scratch = Grid::new(grid.rows(), grid.cols())?;
        Ok(Self {
            buffers: [grid, scratch],
            current: 0,
            kernel,
            generation: 0,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.buffers[self.current]
    }

    pub fn into_grid(self) -> Grid {
        let [a, b] = self.buffers;
        if self.current == 0 { a } else { b }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance one generation.
    pub fn step(&mut self) -> LifeResult<()> {
        let [a, b] = &mut self.buffers;
        let (current, next) = if self.current == 0 { (&*a, b) } else { (&*b, a) };
        self.kernel.step(current, next)?;
        self.current ^= 1;
        self.generation += 1;
        Ok(())
    }

    /// Advance `iterations` generations back to back, timing the loop.
    pub fn run(&mut self, iterations: u64) -> LifeResult<RunReport> {
        let (rows, cols) = self.grid().shape();
        tracing::debug!(kernel = self.kernel.name(), rows, cols, iterations, "run started");

        let start = Instant::now();
        for i in 0..iterations {
            if let Err(err) = self.step() {
                tracing::debug!(
                    kernel = self.kernel.name(),
                    iteration = i,
                    %err,
                    "run aborted"
                );
                return Err(err);
            }
        }
        let report = RunReport {
            elapsed: start.elapsed(),
            rows,
            cols,
            iterations,
        };

        tracing::info!(
            kernel = self.kernel.name(),
            elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
            avg_ms = report.avg_ms(),
            "run finished"
        );
        Ok(report)
    }
}
