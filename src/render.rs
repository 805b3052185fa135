//! Text rendering of a grid snapshot.

use std::fmt;

use crate::grid::Grid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyphs {
    pub alive: char,
    pub dead: char,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            alive: '*',
            dead: ' ',
        }
    }
}

/// One line per row, each cell as a single glyph, rows newline-terminated.
pub fn render(grid: &Grid, glyphs: Glyphs) -> String {
    let mut out = String::with_capacity(grid.rows() * (grid.cols() + 1));
    for row in grid.cells().chunks(grid.cols()) {
        out.extend(
            row.iter()
                .map(|&c| if c != 0 { glyphs.alive } else { glyphs.dead }),
        );
        out.push('\n');
    }
    out
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, Glyphs::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Glyphs, render};
    use crate::grid::Grid;

    #[test]
    fn renders_rows_top_to_bottom() {
        let mut grid = Grid::new(2, 3).unwrap();
        grid.set_alive([(0, 0), (1, 2)]);
        assert_eq!(grid.to_string(), "*  \n  *\n");
        let glyphs = Glyphs {
            alive: '#',
            dead: '.',
        };
        assert_eq!(render(&grid, glyphs), "#..\n..#\n");
    }
}
