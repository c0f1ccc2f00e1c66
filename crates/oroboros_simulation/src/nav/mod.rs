//! # Nav Volume Service
//!
//! Walkability queries over a baked voxel grid.
//!
//! ```text
//! ┌──────────────┐  gzip   ┌────────────┐  ready    ┌─────────────────────┐
//! │ .nav on disk │ ──────► │   decode   │ ────────► │ NavVolume::Ready    │
//! └──────────────┘         └────────────┘           │  is_walkable        │
//!                                │ bad magic /      │  snap_height        │
//!                                │ truncated        └─────────────────────┘
//!                                ▼
//!                     ┌─────────────────────┐
//!                     │ NavVolume::Unusable │  every query degrades, nothing panics
//!                     └─────────────────────┘
//! ```
//!
//! Loading never fails past construction: a bad file is logged and the
//! service stays unusable. The plain queries return a degraded answer
//! (`false`, or the input point); the `try_*` variants return
//! [`SimError::NavUnavailable`] so callers can tell "no data" apart from
//! "nothing found".

mod codec;
mod grid;

use std::path::Path;

use oroboros_shared::constants::NAV_SNAP_RANGE;
use oroboros_shared::Vec3;

pub use codec::{decode, encode, encode_with_magic, NAV_FORMAT_VERSION, NAV_HEADER_SIZE};
pub use grid::{GridCoord, VoxelGrid};

use crate::error::{SimError, SimResult};

/// Load state of the nav service.
#[derive(Clone, Debug)]
enum NavState {
    Ready(VoxelGrid),
    Unusable { reason: String },
}

/// Walkability service for one region.
#[derive(Clone, Debug)]
pub struct NavVolume {
    state: NavState,
}

impl NavVolume {
    /// A service with no data. Every query degrades.
    #[must_use]
    pub fn unusable(reason: impl Into<String>) -> Self {
        Self {
            state: NavState::Unusable {
                reason: reason.into(),
            },
        }
    }

    /// Wraps an already-built grid.
    #[must_use]
    pub fn from_grid(grid: VoxelGrid) -> Self {
        Self {
            state: NavState::Ready(grid),
        }
    }

    /// Decodes a gzip nav volume held in memory.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match decode(bytes) {
            Ok(grid) => {
                tracing::info!(
                    "Nav volume ready: {}x{}x{} voxels",
                    grid.size_x,
                    grid.size_y,
                    grid.size_z
                );
                Self::from_grid(grid)
            }
            Err(err) => {
                tracing::error!("Nav volume unusable: {}", err);
                Self::unusable(err.to_string())
            }
        }
    }

    /// Reads and decodes a nav volume file.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => {
                tracing::info!("Loading nav volume from {}", path.display());
                Self::from_bytes(&bytes)
            }
            Err(err) => {
                tracing::error!("Nav volume {} unreadable: {}", path.display(), err);
                Self::unusable(err.to_string())
            }
        }
    }

    /// Returns true if queries are backed by data.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.state, NavState::Ready(_))
    }

    /// Why the service is unusable, if it is.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            NavState::Ready(_) => None,
            NavState::Unusable { reason } => Some(reason),
        }
    }

    /// Underlying grid, when loaded.
    #[must_use]
    pub const fn grid(&self) -> Option<&VoxelGrid> {
        match &self.state {
            NavState::Ready(grid) => Some(grid),
            NavState::Unusable { .. } => None,
        }
    }

    fn ready(&self) -> SimResult<&VoxelGrid> {
        self.grid().ok_or(SimError::NavUnavailable)
    }

    /// Voxel containing `pos`.
    ///
    /// # Errors
    ///
    /// [`SimError::NavUnavailable`] when no grid is loaded.
    pub fn world_to_grid(&self, pos: Vec3) -> SimResult<GridCoord> {
        Ok(self.ready()?.world_to_grid(pos))
    }

    /// World-space centre of a voxel.
    ///
    /// # Errors
    ///
    /// [`SimError::NavUnavailable`] when no grid is loaded.
    pub fn grid_to_world(&self, coord: GridCoord) -> SimResult<Vec3> {
        Ok(self.ready()?.grid_to_world(coord))
    }

    /// Whether `pos` lies in a walkable voxel.
    ///
    /// # Errors
    ///
    /// [`SimError::NavUnavailable`] when no grid is loaded.
    pub fn try_is_walkable(&self, pos: Vec3) -> SimResult<bool> {
        let grid = self.ready()?;
        Ok(grid.is_walkable(grid.world_to_grid(pos)))
    }

    /// Whether `pos` lies in a walkable voxel. False when unusable.
    #[must_use]
    pub fn is_walkable(&self, pos: Vec3) -> bool {
        self.try_is_walkable(pos).unwrap_or(false)
    }

    /// Centre of the nearest walkable voxel within three voxels above or
    /// below `pos`, or `None` if the column has none.
    ///
    /// # Errors
    ///
    /// [`SimError::NavUnavailable`] when no grid is loaded.
    pub fn try_snap_height(&self, pos: Vec3) -> SimResult<Option<Vec3>> {
        let grid = self.ready()?;
        Ok(grid
            .nearest_walkable_in_column(grid.world_to_grid(pos), NAV_SNAP_RANGE)
            .map(|coord| grid.grid_to_world(coord)))
    }

    /// Projects `pos` onto walkable ground, falling back to `pos` itself.
    #[must_use]
    pub fn snap_height(&self, pos: Vec3) -> Vec3 {
        self.try_snap_height(pos).ok().flatten().unwrap_or(pos)
    }
}

impl Default for NavVolume {
    fn default() -> Self {
        Self::unusable("no nav volume configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_grid() -> VoxelGrid {
        // 8x8 columns, 6 high, floor at y = 2.
        let mut grid = VoxelGrid::new([8, 6, 8], Vec3::ZERO, 1.0);
        for x in 0..8 {
            for z in 0..8 {
                grid.set_walkable(GridCoord::new(x, 2, z), true);
            }
        }
        grid
    }

    #[test]
    fn test_unusable_degrades() {
        let nav = NavVolume::default();
        assert!(!nav.is_available());
        assert!(!nav.is_walkable(Vec3::ZERO));
        assert!(matches!(nav.try_is_walkable(Vec3::ZERO), Err(SimError::NavUnavailable)));
        assert_eq!(nav.snap_height(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(1.0, 2.0, 3.0));
        assert!(nav.world_to_grid(Vec3::ZERO).is_err());
    }

    #[test]
    fn test_bad_magic_leaves_service_unusable() {
        let bytes = encode_with_magic(&floor_grid(), 0x0BAD_F00D).unwrap();
        let nav = NavVolume::from_bytes(&bytes);
        assert!(!nav.is_available());
        assert!(nav.unavailable_reason().unwrap().contains("magic"));
        for x in 0..8 {
            assert!(!nav.is_walkable(Vec3::new(x as f32 + 0.5, 2.5, 0.5)));
        }
    }

    #[test]
    fn test_walkable_queries() {
        let nav = NavVolume::from_bytes(&encode(&floor_grid()).unwrap());
        assert!(nav.is_available());
        assert!(nav.is_walkable(Vec3::new(3.5, 2.2, 3.5)));
        assert!(!nav.is_walkable(Vec3::new(3.5, 3.2, 3.5)));
        assert!(!nav.is_walkable(Vec3::new(-0.5, 2.2, 3.5)));
        assert!(!nav.try_is_walkable(Vec3::new(3.5, 3.2, 3.5)).unwrap());
    }

    #[test]
    fn test_snap_height() {
        let nav = NavVolume::from_grid(floor_grid());
        assert_eq!(nav.snap_height(Vec3::new(1.2, 4.9, 6.7)), Vec3::new(1.5, 2.5, 6.5));
        assert_eq!(nav.snap_height(Vec3::new(1.2, 0.1, 6.7)), Vec3::new(1.5, 2.5, 6.5));
        // Outside the grid: nothing in range, the input comes back.
        let far = Vec3::new(50.0, 2.0, 50.0);
        assert_eq!(nav.snap_height(far), far);
        assert_eq!(nav.try_snap_height(far).unwrap(), None);
    }

    #[test]
    fn test_missing_file() {
        let nav = NavVolume::load("/definitely/not/here.nav");
        assert!(!nav.is_available());
    }
}
