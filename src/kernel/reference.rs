//! Sequential reference transition.
//!
//! Straight 3x3 scan with Euclidean wraparound on both axes. The sum includes
//! the cell itself, so a dead cell is born at 3 and a live cell survives at 3
//! or 4. Tiny boards (1 or 2 along an axis) count wrapped duplicates as-is.

use super::Transition;
use crate::error::LifeResult;
use crate::grid::Grid;

#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceKernel;

impl Transition for ReferenceKernel {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()> {
        advance(current, next)
    }
}

/// Write the generation after `current` into `next`.
pub fn advance(current: &Grid, next: &mut Grid) -> LifeResult<()> {
    next.ensure_shape(current.rows(), current.cols())?;

    let rows = current.rows() as isize;
    let cols = current.cols() as isize;
    let src = current.cells();
    let dst = next.cells_mut();

    let mut idx = 0usize;
    for i in 0..rows {
        for j in 0..cols {
            let mut sum = 0u8;
            for di in -1..=1 {
                for dj in -1..=1 {
                    let ii = (i + di).rem_euclid(rows);
                    let jj = (j + dj).rem_euclid(cols);
                    sum += src[(ii * cols + jj) as usize];
                }
            }
            let alive = src[idx];
            dst[idx] = if alive == 0 {
                (sum == 3) as u8
            } else {
                (sum == 3 || sum == 4) as u8
            };
            idx += 1;
        }
    }
    Ok(())
}

/// Freshly allocated successor of `current`.
pub fn next_generation(current: &Grid) -> LifeResult<Grid> {
    let mut next = Grid::new(current.rows(), current.cols())?;
    advance(current, &mut next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::next_generation;
    use crate::grid::Grid;

    #[test]
    fn blinker_flips_orientation() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.set_alive([(2, 1), (2, 2), (2, 3)]);

        let next = next_generation(&grid).unwrap();
        let mut expected = Grid::new(5, 5).unwrap();
        expected.set_alive([(1, 2), (2, 2), (3, 2)]);
        assert_eq!(next, expected);

        assert_eq!(next_generation(&next).unwrap(), grid);
    }

    #[test]
    fn block_is_still_life() {
        let mut grid = Grid::new(6, 6).unwrap();
        grid.set_alive([(2, 2), (2, 3), (3, 2), (3, 3)]);
        assert_eq!(next_generation(&grid).unwrap(), grid);
    }

    #[test]
    fn input_is_untouched() {
        let mut grid = Grid::new(4, 4).unwrap();
        grid.set_alive([(0, 0), (0, 1), (1, 0)]);
        let before = grid.clone();
        let _ = next_generation(&grid).unwrap();
        assert_eq!(grid, before);
    }

    #[test]
    fn single_cell_board_sees_itself_nine_times() {
        let mut grid = Grid::new(1, 1).unwrap();
        grid.set(0, 0, true);
        // sum = 9: neither birth nor survival
        assert!(next_generation(&grid).unwrap().is_empty());
    }
}
