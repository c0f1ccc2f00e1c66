//! Grid cell coordinates on the ground plane.

use oroboros_shared::Vec3;

/// Integer cell on the XZ plane.
///
/// Always derived from a position; never stored apart from the entity it
/// indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Cell X index.
    pub x: i32,
    /// Cell Z index.
    pub z: i32,
}

impl CellCoord {
    /// Creates a cell coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Cell containing `pos` for the given edge length (floor division).
    #[inline]
    #[must_use]
    pub fn from_position(pos: Vec3, cell_size: f32) -> Self {
        Self {
            x: (pos.x / cell_size).floor() as i32,
            z: (pos.z / cell_size).floor() as i32,
        }
    }

    /// Iterates the square ring of cells within `radius` cells, self included.
    ///
    /// Coordinates saturate at the `i32` range instead of wrapping.
    pub fn neighborhood(self, radius: i32) -> impl Iterator<Item = CellCoord> {
        let radius = radius.max(0);
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius)
                .map(move |dz| CellCoord::new(self.x.saturating_add(dx), self.z.saturating_add(dz)))
        })
    }

    /// Chebyshev distance in cells, widened so it cannot overflow.
    #[inline]
    #[must_use]
    pub fn ring_distance(self, other: CellCoord) -> i64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        dx.max(dz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_handles_negatives() {
        assert_eq!(CellCoord::from_position(Vec3::new(4.9, 0.0, 0.0), 5.0), CellCoord::new(0, 0));
        assert_eq!(CellCoord::from_position(Vec3::new(5.0, 0.0, -0.1), 5.0), CellCoord::new(1, -1));
        assert_eq!(CellCoord::from_position(Vec3::new(-5.0, 99.0, -5.1), 5.0), CellCoord::new(-1, -2));
    }

    #[test]
    fn test_neighborhood_size() {
        let cells: Vec<_> = CellCoord::new(0, 0).neighborhood(2).collect();
        assert_eq!(cells.len(), 25);
        assert!(cells.contains(&CellCoord::new(-2, 2)));
        assert_eq!(CellCoord::new(3, 3).neighborhood(0).count(), 1);
    }

    #[test]
    fn test_neighborhood_saturates_at_grid_edge() {
        let edge = CellCoord::new(i32::MAX, i32::MIN);
        let cells: Vec<_> = edge.neighborhood(1).collect();
        assert_eq!(cells.len(), 9);
        assert!(cells.iter().all(|c| c.x >= i32::MAX - 1 && c.z <= i32::MIN + 1));
        assert_eq!(edge.ring_distance(CellCoord::new(i32::MIN, i32::MAX)), (1_i64 << 32) - 1);
    }
}
