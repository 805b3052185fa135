//! Data-parallel transition.
//!
//! Every output cell is an independent work-item: it reads the frozen input
//! snapshot and writes only its own slot. Rows are handed to rayon tasks in
//! contiguous chunks; the pool join at the end of `install` is the only
//! barrier per generation.

use rayon::prelude::*;

use super::Transition;
use crate::config::LifeConfig;
use crate::error::LifeResult;
use crate::grid::Grid;
use crate::pool::{build_pool, resolve_thread_count};

/// Boards smaller than this are stepped on the calling thread.
const PARALLEL_MIN_CELLS: usize = 1 << 16;
/// Lower bound on cells per rayon task, to amortize scheduling.
const TASK_MIN_CELLS: usize = 1 << 14;

/// Next state indexed by `[alive][3x3 sum including self]`.
pub(crate) const RULE: [[u8; 10]; 2] = [
    [0, 0, 0, 1, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 1, 1, 0, 0, 0, 0, 0],
];

/// Rows above and below `row`, wrapped.
#[inline(always)]
pub(crate) fn wrapped_rows(row: usize, rows: usize) -> (usize, usize) {
    let up = if row == 0 { rows - 1 } else { row - 1 };
    let down = if row + 1 == rows { 0 } else { row + 1 };
    (up, down)
}

/// The three row slices a work-item on `row` reads from.
#[inline(always)]
pub(crate) fn row_band(cells: &[u8], rows: usize, cols: usize, row: usize) -> (&[u8], &[u8], &[u8]) {
    let (up, down) = wrapped_rows(row, rows);
    (
        &cells[up * cols..(up + 1) * cols],
        &cells[row * cols..(row + 1) * cols],
        &cells[down * cols..(down + 1) * cols],
    )
}

#[inline(always)]
fn column_sum(above: &[u8], here: &[u8], below: &[u8], col: usize) -> u8 {
    above[col] + here[col] + below[col]
}

/// One work-item: next value of `here[col]` given its row band.
#[inline(always)]
pub(crate) fn cell_next(above: &[u8], here: &[u8], below: &[u8], col: usize) -> u8 {
    let cols = here.len();
    let left = if col == 0 { cols - 1 } else { col - 1 };
    let right = if col + 1 == cols { 0 } else { col + 1 };
    let sum = column_sum(above, here, below, left)
        + column_sum(above, here, below, col)
        + column_sum(above, here, below, right);
    RULE[here[col] as usize][sum as usize]
}

#[inline]
fn advance_row(above: &[u8], here: &[u8], below: &[u8], out: &mut [u8]) {
    for (col, slot) in out.iter_mut().enumerate() {
        *slot = cell_next(above, here, below, col);
    }
}

#[inline]
fn rows_per_task(cols: usize) -> usize {
    TASK_MIN_CELLS.div_ceil(cols).max(1)
}

pub struct ParallelKernel {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl ParallelKernel {
    pub fn with_config(config: &LifeConfig) -> LifeResult<Self> {
        Self::with_threads(resolve_thread_count(config))
    }

    pub fn with_threads(threads: usize) -> LifeResult<Self> {
        let threads = threads.max(1);
        let pool = build_pool(threads, "life-par")?;
        Ok(Self { pool, threads })
    }
}

impl Transition for ParallelKernel {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()> {
        next.ensure_shape(current.rows(), current.cols())?;
        let (rows, cols) = current.shape();
        let src = current.cells();
        let dst = next.cells_mut();

        if self.threads == 1 || src.len() < PARALLEL_MIN_CELLS {
            for (row, out) in dst.chunks_mut(cols).enumerate() {
                let (above, here, below) = row_band(src, rows, cols, row);
                advance_row(above, here, below, out);
            }
            return Ok(());
        }

        let min_rows = rows_per_task(cols);
        self.pool.install(|| {
            dst.par_chunks_mut(cols)
                .enumerate()
                .with_min_len(min_rows)
                .for_each(|(row, out)| {
                    let (above, here, below) = row_band(src, rows, cols, row);
                    advance_row(above, here, below, out);
                });
        });
        Ok(())
    }
}
