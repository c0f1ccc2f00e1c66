//! # Area of Interest Index
//!
//! Grid-based proximity index. Each entity lives in exactly one ground-plane
//! cell; height is handled by a tolerance band at query time rather than by
//! bucketing, which models near-2D visibility with vertical slack.
//!
//! ## Visibility rule
//!
//! B is visible to A iff
//! - `horizontal_distance_squared(A, B) <= view_range²`
//! - `|A.y - B.y| <= height_tolerance`
//! - `B != A`
//!
//! ## Complexity
//!
//! An update scans the `⌈view_range / cell_size⌉` ring of cells around the
//! entity, never the whole population. The ring is capped at
//! [`MAX_VIEW_CELLS`]; wider circle queries walk the occupied cells instead.

use std::collections::{BTreeSet, HashMap};

use oroboros_shared::{EntityId, Vec3};

use super::cell::CellCoord;
use crate::config::{AoiConfig, MAX_VIEW_CELLS};

/// Visibility change produced by one [`SpatialIndex::update`].
///
/// `enter` and `leave` are disjoint and sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AoiDelta {
    /// Entities that became visible.
    pub enter: Vec<EntityId>,
    /// Entities that stopped being visible.
    pub leave: Vec<EntityId>,
}

impl AoiDelta {
    /// Returns true if visibility did not change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enter.is_empty() && self.leave.is_empty()
    }
}

/// Per-entity AOI bookkeeping.
#[derive(Clone, Debug)]
struct AoiRecord {
    /// Last known position.
    position: Vec3,
    /// Always the cell of `position`.
    cell: CellCoord,
    /// Result of the last visibility computation.
    visible: BTreeSet<EntityId>,
    /// Entities whose `visible` cache currently holds this one.
    watchers: BTreeSet<EntityId>,
}

/// Grid AOI index for one region.
pub struct SpatialIndex {
    config: AoiConfig,
    /// Cells scanned each way for a view-range query.
    view_cells: i32,
    cells: HashMap<CellCoord, Vec<EntityId>>,
    records: HashMap<EntityId, AoiRecord>,
}

impl SpatialIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(config: AoiConfig) -> Self {
        let view_cells = (config.view_range / config.cell_size)
            .ceil()
            .clamp(0.0, MAX_VIEW_CELLS as f32) as i32;
        Self {
            config,
            view_cells,
            cells: HashMap::new(),
            records: HashMap::new(),
        }
    }

    /// Grid settings.
    #[must_use]
    pub const fn config(&self) -> &AoiConfig {
        &self.config
    }

    /// Cells scanned each way around an observer.
    #[must_use]
    pub const fn view_cells(&self) -> i32 {
        self.view_cells
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Last known position of `id`.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Vec3> {
        self.records.get(&id).map(|r| r.position)
    }

    /// Current cell of `id`.
    #[must_use]
    pub fn cell_of(&self, id: EntityId) -> Option<CellCoord> {
        self.records.get(&id).map(|r| r.cell)
    }

    /// Cached visible set of `id` as of its last update.
    #[must_use]
    pub fn visible_set(&self, id: EntityId) -> Option<&BTreeSet<EntityId>> {
        self.records.get(&id).map(|r| &r.visible)
    }

    /// Registers `id` at `pos`.
    ///
    /// Idempotent: returns `false` and changes nothing if `id` is already
    /// indexed. The visible set starts empty until the first update.
    pub fn add(&mut self, id: EntityId, pos: Vec3) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        let cell = self.cell_for(pos);
        self.cells.entry(cell).or_default().push(id);
        self.records.insert(
            id,
            AoiRecord {
                position: pos,
                cell,
                visible: BTreeSet::new(),
                watchers: BTreeSet::new(),
            },
        );
        true
    }

    /// Moves `id` to `new_pos` and recomputes its visible set.
    ///
    /// The set is recomputed even without a cell change, since other
    /// entities may have moved. Unknown ids are registered first.
    pub fn update(&mut self, id: EntityId, new_pos: Vec3) -> AoiDelta {
        if self.add(id, new_pos) {
            tracing::debug!("AOI update for unregistered entity {}, registered", id);
        }

        let new_cell = self.cell_for(new_pos);
        let old_cell = match self.records.get_mut(&id) {
            Some(record) => {
                let old = record.cell;
                record.position = new_pos;
                record.cell = new_cell;
                old
            }
            None => return AoiDelta::default(),
        };
        if old_cell != new_cell {
            self.detach(id, old_cell);
            self.cells.entry(new_cell).or_default().push(id);
        }

        let visible = self.compute_visible(id, new_pos, new_cell);
        let Some(record) = self.records.get_mut(&id) else {
            return AoiDelta::default();
        };
        let delta = AoiDelta {
            enter: visible.difference(&record.visible).copied().collect(),
            leave: record.visible.difference(&visible).copied().collect(),
        };
        record.visible = visible;

        for other in &delta.enter {
            if let Some(other_record) = self.records.get_mut(other) {
                other_record.watchers.insert(id);
            }
        }
        for other in &delta.leave {
            if let Some(other_record) = self.records.get_mut(other) {
                other_record.watchers.remove(&id);
            }
        }
        delta
    }

    /// Unregisters `id`.
    ///
    /// Besides clearing its own record, `id` is dropped from every observer
    /// cache that held it. Those observers are returned (sorted) so the
    /// owner can send them leave notifications right away.
    pub fn remove(&mut self, id: EntityId) -> Vec<EntityId> {
        let Some(record) = self.records.remove(&id) else {
            return Vec::new();
        };
        self.detach(id, record.cell);

        for other in &record.visible {
            if let Some(other_record) = self.records.get_mut(other) {
                other_record.watchers.remove(&id);
            }
        }
        let observers: Vec<EntityId> = record.watchers.into_iter().collect();
        for other in &observers {
            if let Some(other_record) = self.records.get_mut(other) {
                other_record.visible.remove(&id);
            }
        }
        observers
    }

    /// All entities within `radius` of `center` (horizontal distance plus
    /// height tolerance), sorted by id.
    ///
    /// Independent of any entity's visibility cache. Negative, NaN and
    /// infinite radii match nothing.
    #[must_use]
    pub fn query_circle(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        if !radius.is_finite() || radius < 0.0 {
            tracing::debug!("Rejected circle query with radius {}", radius);
            return Vec::new();
        }
        let ring = (radius / self.config.cell_size).ceil() as i32;
        let radius_sq = radius * radius;

        let mut found = Vec::new();
        self.for_each_near(self.cell_for(center), ring, |id, record| {
            if center.horizontal_distance_squared(record.position) <= radius_sq
                && (center.y - record.position.y).abs() <= self.config.height_tolerance
            {
                found.push(id);
            }
        });
        found.sort_unstable();
        found
    }

    fn compute_visible(&self, id: EntityId, pos: Vec3, cell: CellCoord) -> BTreeSet<EntityId> {
        let range_sq = self.config.view_range * self.config.view_range;
        let mut visible = BTreeSet::new();
        self.for_each_near(cell, self.view_cells, |other, record| {
            if other != id
                && pos.horizontal_distance_squared(record.position) <= range_sq
                && (pos.y - record.position.y).abs() <= self.config.height_tolerance
            {
                visible.insert(other);
            }
        });
        visible
    }

    /// Visits every indexed entity whose cell lies within `ring` cells of
    /// `center`.
    ///
    /// When the ring spans more cells than are occupied, the occupied cells
    /// are walked instead, so cost never exceeds the population.
    fn for_each_near(&self, center: CellCoord, ring: i32, mut visit: impl FnMut(EntityId, &AoiRecord)) {
        let span = 2.0 * f64::from(ring.max(0)) + 1.0;
        if span * span > self.cells.len() as f64 {
            for (cell, bucket) in &self.cells {
                if center.ring_distance(*cell) > i64::from(ring) {
                    continue;
                }
                for id in bucket {
                    if let Some(record) = self.records.get(id) {
                        visit(*id, record);
                    }
                }
            }
            return;
        }
        for cell in center.neighborhood(ring) {
            let Some(bucket) = self.cells.get(&cell) else {
                continue;
            };
            for id in bucket {
                if let Some(record) = self.records.get(id) {
                    visit(*id, record);
                }
            }
        }
    }

    fn detach(&mut self, id: EntityId, cell: CellCoord) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(index) = bucket.iter().position(|e| *e == id) {
                bucket.swap_remove(index);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    #[inline]
    fn cell_for(&self, pos: Vec3) -> CellCoord {
        CellCoord::from_position(pos, self.config.cell_size)
    }
}
