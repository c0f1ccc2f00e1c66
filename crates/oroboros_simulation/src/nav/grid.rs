//! Voxel walkability grid.

use oroboros_shared::Vec3;

/// Integer voxel coordinate. May lie outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoord {
    /// X index.
    pub x: i32,
    /// Y index (vertical).
    pub y: i32,
    /// Z index.
    pub z: i32,
}

impl GridCoord {
    /// Creates a grid coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Same column, shifted vertically.
    #[inline]
    #[must_use]
    pub const fn offset_y(self, dy: i32) -> Self {
        Self::new(self.x, self.y + dy, self.z)
    }
}

/// Dense walkability bitset over an axis-aligned box of voxels.
///
/// Bit `x*(size_y*size_z) + y*size_z + z` is set when that voxel can be
/// stood on. Bits are LSB-first within each byte.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    /// Voxels along X.
    pub size_x: i32,
    /// Voxels along Y.
    pub size_y: i32,
    /// Voxels along Z.
    pub size_z: i32,
    /// World position of the grid's minimum corner.
    pub origin: Vec3,
    /// Voxel edge length in world units.
    pub voxel_size: f32,
    /// Baked area mask. Carried through, not interpreted.
    pub area_mask: i32,
    /// Agent radius the grid was baked for. Carried through, not interpreted.
    pub sample_radius: f32,
    pub(crate) bits: Vec<u8>,
}

impl VoxelGrid {
    /// Creates a grid with every voxel unwalkable.
    ///
    /// Negative dimensions are treated as zero.
    #[must_use]
    pub fn new(size: [i32; 3], origin: Vec3, voxel_size: f32) -> Self {
        let [size_x, size_y, size_z] = size.map(|s| s.max(0));
        let count = size_x as usize * size_y as usize * size_z as usize;
        Self {
            size_x,
            size_y,
            size_z,
            origin,
            voxel_size,
            area_mask: 0,
            sample_radius: 0.0,
            bits: vec![0; count.div_ceil(8)],
        }
    }

    /// Total voxel count.
    #[must_use]
    pub const fn voxel_count(&self) -> usize {
        self.size_x as usize * self.size_y as usize * self.size_z as usize
    }

    /// Raw bitset bytes.
    #[must_use]
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Returns true if `coord` lies inside the grid.
    #[inline]
    #[must_use]
    pub const fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && coord.x < self.size_x
            && coord.y < self.size_y
            && coord.z < self.size_z
    }

    /// Flat bit index of `coord`, or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn bit_index(&self, coord: GridCoord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let (y_len, z_len) = (self.size_y as usize, self.size_z as usize);
        Some(coord.x as usize * (y_len * z_len) + coord.y as usize * z_len + coord.z as usize)
    }

    /// Walkability of one voxel. Outside the grid is unwalkable.
    #[must_use]
    pub fn is_walkable(&self, coord: GridCoord) -> bool {
        self.bit_index(coord)
            .and_then(|i| self.bits.get(i / 8).map(|byte| byte & (1 << (i % 8)) != 0))
            .unwrap_or(false)
    }

    /// Marks one voxel. Returns false if `coord` is outside the grid.
    pub fn set_walkable(&mut self, coord: GridCoord, walkable: bool) -> bool {
        let Some(i) = self.bit_index(coord) else {
            return false;
        };
        let Some(byte) = self.bits.get_mut(i / 8) else {
            return false;
        };
        if walkable {
            *byte |= 1 << (i % 8);
        } else {
            *byte &= !(1 << (i % 8));
        }
        true
    }

    /// Voxel containing a world position (floor division from the origin).
    #[inline]
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec3) -> GridCoord {
        let local = pos - self.origin;
        GridCoord::new(
            (local.x / self.voxel_size).floor() as i32,
            (local.y / self.voxel_size).floor() as i32,
            (local.z / self.voxel_size).floor() as i32,
        )
    }

    /// World-space centre of a voxel.
    #[inline]
    #[must_use]
    pub fn grid_to_world(&self, coord: GridCoord) -> Vec3 {
        let half = self.voxel_size * 0.5;
        Vec3::new(
            self.origin.x + coord.x as f32 * self.voxel_size + half,
            self.origin.y + coord.y as f32 * self.voxel_size + half,
            self.origin.z + coord.z as f32 * self.voxel_size + half,
        )
    }

    /// Nearest walkable voxel in the column of `coord`, within `range`
    /// voxels up or down.
    ///
    /// Scan order is 0, -1, +1, -2, +2, ...: nearest first, below before
    /// above on ties.
    #[must_use]
    pub fn nearest_walkable_in_column(&self, coord: GridCoord, range: i32) -> Option<GridCoord> {
        if self.is_walkable(coord) {
            return Some(coord);
        }
        (1..=range).find_map(|step| {
            [coord.offset_y(-step), coord.offset_y(step)]
                .into_iter()
                .find(|c| self.is_walkable(*c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VoxelGrid {
        VoxelGrid::new([4, 3, 2], Vec3::ZERO, 1.0)
    }

    #[test]
    fn test_bit_index_order() {
        let g = grid();
        assert_eq!(g.bit_index(GridCoord::new(0, 0, 0)), Some(0));
        assert_eq!(g.bit_index(GridCoord::new(0, 0, 1)), Some(1));
        assert_eq!(g.bit_index(GridCoord::new(0, 1, 0)), Some(2));
        assert_eq!(g.bit_index(GridCoord::new(1, 0, 0)), Some(6));
        assert_eq!(g.bit_index(GridCoord::new(3, 2, 1)), Some(23));
        assert_eq!(g.bit_index(GridCoord::new(4, 0, 0)), None);
        assert_eq!(g.bit_index(GridCoord::new(0, -1, 0)), None);
    }

    #[test]
    fn test_bits_are_lsb_first() {
        let mut g = grid();
        assert!(g.set_walkable(GridCoord::new(0, 0, 1), true));
        assert!(g.set_walkable(GridCoord::new(1, 1, 0), true));
        // Indices 1 and 8.
        assert_eq!(g.bits(), &[0b0000_0010, 0b0000_0001, 0]);
        assert!(g.is_walkable(GridCoord::new(1, 1, 0)));
        assert!(g.set_walkable(GridCoord::new(1, 1, 0), false));
        assert!(!g.is_walkable(GridCoord::new(1, 1, 0)));
    }

    #[test]
    fn test_world_grid_conversion() {
        let g = VoxelGrid::new([10, 10, 10], Vec3::new(-5.0, 0.0, 2.0), 0.5);
        assert_eq!(g.world_to_grid(Vec3::new(-5.0, 0.0, 2.0)), GridCoord::new(0, 0, 0));
        assert_eq!(g.world_to_grid(Vec3::new(-4.1, 1.2, 2.6)), GridCoord::new(1, 2, 1));
        assert_eq!(g.world_to_grid(Vec3::new(-5.1, 0.0, 2.0)), GridCoord::new(-1, 0, 0));
        assert_eq!(g.grid_to_world(GridCoord::new(1, 2, 1)), Vec3::new(-4.25, 1.25, 2.75));
    }

    #[test]
    fn test_column_scan_prefers_below_on_ties() {
        let mut g = VoxelGrid::new([1, 10, 1], Vec3::ZERO, 1.0);
        g.set_walkable(GridCoord::new(0, 3, 0), true);
        g.set_walkable(GridCoord::new(0, 7, 0), true);
        assert_eq!(g.nearest_walkable_in_column(GridCoord::new(0, 5, 0), 3), Some(GridCoord::new(0, 3, 0)));
        assert_eq!(g.nearest_walkable_in_column(GridCoord::new(0, 6, 0), 3), Some(GridCoord::new(0, 7, 0)));
        assert_eq!(g.nearest_walkable_in_column(GridCoord::new(0, 0, 0), 2), None);
        assert_eq!(g.nearest_walkable_in_column(GridCoord::new(0, 0, 0), 3), Some(GridCoord::new(0, 3, 0)));
    }
}
