//! Moving windows and grid-graph connectivity

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Square focal window of odd side length, centred on the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    size: usize,
}

impl Window {
    /// `size` must be odd and at least 3.
    pub fn square(size: usize) -> Result<Self> {
        if size < 3 || size % 2 == 0 {
            return Err(Error::invalid_parameter(
                "window_size",
                size,
                "must be an odd number of cells, at least 3",
            ));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        self.size / 2
    }

    /// Relative (row, col) offsets, centre included, in row-major order.
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .collect()
    }
}

impl Default for Window {
    fn default() -> Self {
        Self { size: 3 }
    }
}

/// Which neighbours a cell is joined to in the routing graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Rook moves only
    Four,
    /// Rook and bishop moves
    #[default]
    Eight,
}

impl Connectivity {
    /// D8 direction codes reachable under this connectivity.
    pub fn directions(&self) -> &'static [u8] {
        match self {
            Connectivity::Four => &[1, 3, 5, 7],
            Connectivity::Eight => &[1, 2, 3, 4, 5, 6, 7, 8],
        }
    }
}

/// D8 direction codes (1 = E, counter-clockwise to 8 = SE; 0 = none)
pub mod d8 {
    /// (row_offset, col_offset) indexed by direction code
    pub const OFFSETS: [(isize, isize); 9] = [
        (0, 0),   // 0: none
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Step length in cells for each direction
    pub const DISTANCES: [f64; 9] = [
        0.0,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
    ];

    pub fn opposite(dir: u8) -> u8 {
        if dir == 0 { 0 } else { ((dir - 1 + 4) % 8) + 1 }
    }

    /// Neighbour of `(row, col)` in direction `dir`, if inside `rows × cols`.
    pub fn step(row: usize, col: usize, dir: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = OFFSETS[dir as usize];
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        (r < rows && c < cols).then_some((r, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_offsets() {
        let w = Window::square(3).unwrap();
        assert_eq!(w.offsets().len(), 9);
        assert_eq!(w.offsets()[0], (-1, -1));
        assert_eq!(Window::square(5).unwrap().offsets().len(), 25);
    }

    #[test]
    fn test_window_rejects_even_and_small() {
        assert!(Window::square(4).is_err());
        assert!(Window::square(1).is_err());
    }

    #[test]
    fn test_d8_opposite() {
        assert_eq!(d8::opposite(1), 5); // E -> W
        assert_eq!(d8::opposite(3), 7); // N -> S
        assert_eq!(d8::opposite(2), 6); // NE -> SW
        assert_eq!(d8::opposite(8), 4);
    }

    #[test]
    fn test_d8_step_bounds() {
        assert_eq!(d8::step(0, 0, 3, 5, 5), None);
        assert_eq!(d8::step(0, 0, 8, 5, 5), Some((1, 1)));
        assert_eq!(d8::step(4, 4, 1, 5, 5), None);
    }

    #[test]
    fn test_connectivity_directions() {
        assert_eq!(Connectivity::Four.directions().len(), 4);
        assert_eq!(Connectivity::default().directions().len(), 8);
    }
}
