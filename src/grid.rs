//! Row-major toroidal cell storage.
//!
//! A `Grid` owns `rows * cols` bytes, each exactly 0 or 1. Kernels never edit
//! a grid they are reading; a generation is produced by writing a whole second
//! grid of the same shape.

use rand::Rng;

use crate::error::{LifeError, LifeResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

/// Validate dimensions and return the cell count.
pub(crate) fn cell_count(rows: usize, cols: usize) -> LifeResult<usize> {
    if rows == 0 || cols == 0 {
        return Err(LifeError::allocation(rows, cols, "dimensions must be positive"));
    }
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| LifeError::allocation(rows, cols, "rows * cols overflows"))?;
    if len > isize::MAX as usize {
        return Err(LifeError::allocation(rows, cols, "exceeds addressable size"));
    }
    Ok(len)
}

impl Grid {
    /// Allocate an all-dead grid.
    pub fn new(rows: usize, cols: usize) -> LifeResult<Self> {
        let len = cell_count(rows, cols)?;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| LifeError::allocation(rows, cols, "out of memory"))?;
        cells.resize(len, 0);
        Ok(Self { rows, cols, cells })
    }

    /// Wrap an existing row-major buffer, checking length and cell values.
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<u8>) -> LifeResult<Self> {
        let len = cell_count(rows, cols)?;
        if cells.len() != len {
            return Err(LifeError::allocation(rows, cols, "buffer length differs from rows * cols"));
        }
        let grid = Self { rows, cols, cells };
        grid.validate()?;
        Ok(grid)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major cell bytes, the form handed to a device upload.
    #[inline]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[inline]
    pub(crate) fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Row-major offset of `(row, col)`.
    ///
    /// # Panics
    ///
    /// If `row >= rows` or `col >= cols`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) out of bounds for {}x{} grid",
            self.rows,
            self.cols
        );
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[self.index(row, col)] != 0
    }

    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        let idx = self.index(row, col);
        self.cells[idx] = alive as u8;
    }

    /// Set every listed `(row, col)` alive.
    pub fn set_alive<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        for (row, col) in cells {
            self.set(row, col, true);
        }
    }

    /// Overwrite every cell with an independent fair coin flip.
    pub fn seed_random<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for cell in &mut self.cells {
            *cell = rng.random::<bool>() as u8;
        }
    }

    /// Overwrite every cell, alive with probability `density` clamped to
    /// [0, 1]. NaN counts as 0.
    pub fn seed_random_with_density<R: Rng + ?Sized>(&mut self, rng: &mut R, density: f64) {
        let density = if density.is_nan() { 0.0 } else { density.clamp(0.0, 1.0) };
        for cell in &mut self.cells {
            *cell = rng.random_bool(density) as u8;
        }
    }

    pub fn population(&self) -> u64 {
        self.cells.iter().map(|&c| c as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// Check the 0/1 invariant, reporting the first offending cell.
    pub fn validate(&self) -> LifeResult<()> {
        match self.cells.iter().position(|&c| c > 1) {
            Some(index) => Err(LifeError::CorruptCells {
                index,
                value: self.cells[index],
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn ensure_shape(&self, rows: usize, cols: usize) -> LifeResult<()> {
        if self.shape() == (rows, cols) {
            Ok(())
        } else {
            Err(LifeError::Shape {
                expected: (rows, cols),
                found: self.shape(),
            })
        }
    }
}
