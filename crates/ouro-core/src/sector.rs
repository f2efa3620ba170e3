//! Capacity bucketing: backlog count → sector occupancy with one frontier.

use serde::{Deserialize, Serialize};

use crate::constants::{SECTOR_CAPACITY, TOTAL_SECTORS};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorOccupancy {
    pub total_sectors: usize,
    pub sector_capacity: u64,
    pub occupied_count: usize,
    /// -1 when no sector is active.
    pub active_sector_index: i64,
    pub items_in_active_sector: u64,
    pub active_sector_fill_percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectorState {
    ClearedBehind,
    Active,
    Untouched,
}

impl SectorOccupancy {
    /// Index of the frontier sector, if any.
    pub fn active_sector(&self) -> Option<usize> {
        usize::try_from(self.active_sector_index).ok()
    }

    /// Three-way classification of one sector relative to the frontier.
    pub fn classify(&self, index: usize) -> SectorState {
        match self.active_sector() {
            Some(active) if index < active => SectorState::ClearedBehind,
            Some(active) if index == active => SectorState::Active,
            _ => SectorState::Untouched,
        }
    }

    /// Classification of every sector on the map, in index order.
    pub fn sectors(&self) -> Vec<SectorState> {
        (0..self.total_sectors).map(|i| self.classify(i)).collect()
    }
}

/// Bucket `backlog` items into `total_sectors` sectors of `sector_capacity`.
///
/// A backlog that is an exact multiple of the capacity leaves the frontier
/// sector full, not empty. A capacity of 0 is treated as 1.
pub fn occupancy(backlog: u64, sector_capacity: u64, total_sectors: usize) -> SectorOccupancy {
    let capacity = sector_capacity.max(1);
    let occupied = backlog.div_ceil(capacity).min(total_sectors as u64) as usize;
    let active_sector_index = occupied as i64 - 1;

    let remainder = backlog % capacity;
    let items = if remainder == 0 && backlog > 0 {
        capacity
    } else {
        remainder
    };
    let fill = (capacity - items) as f64 / capacity as f64 * 100.0;

    SectorOccupancy {
        total_sectors,
        sector_capacity: capacity,
        occupied_count: occupied,
        active_sector_index,
        items_in_active_sector: items,
        active_sector_fill_percent: fill,
    }
}

/// Occupancy on the default cortex map.
pub fn default_occupancy(backlog: u64) -> SectorOccupancy {
    occupancy(backlog, SECTOR_CAPACITY, TOTAL_SECTORS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_backlog_has_no_frontier() {
        let occ = occupancy(0, 50, 32);
        assert_eq!(occ.occupied_count, 0);
        assert_eq!(occ.active_sector_index, -1);
        assert_eq!(occ.active_sector(), None);
        assert!(occ.sectors().iter().all(|s| *s == SectorState::Untouched));
    }

    #[test]
    fn test_partial_frontier() {
        let occ = occupancy(120, 50, 32);
        assert_eq!(occ.occupied_count, 3);
        assert_eq!(occ.active_sector_index, 2);
        assert_eq!(occ.items_in_active_sector, 20);
        assert_relative_eq!(occ.active_sector_fill_percent, 60.0);
    }

    #[test]
    fn test_exact_multiple_is_full_sector() {
        let occ = occupancy(100, 50, 32);
        assert_eq!(occ.occupied_count, 2);
        assert_eq!(occ.active_sector_index, 1);
        assert_eq!(occ.items_in_active_sector, 50);
        assert_relative_eq!(occ.active_sector_fill_percent, 0.0);
    }

    #[test]
    fn test_single_item() {
        let occ = occupancy(1, 50, 32);
        assert_eq!(occ.active_sector_index, 0);
        assert_eq!(occ.items_in_active_sector, 1);
        assert_relative_eq!(occ.active_sector_fill_percent, 98.0);
    }

    #[test]
    fn test_occupied_clamped_to_grid() {
        let occ = occupancy(10_000, 50, 32);
        assert_eq!(occ.occupied_count, 32);
        assert_eq!(occ.active_sector_index, 31);
        assert_eq!(occ.classify(31), SectorState::Active);
        assert_eq!(occ.classify(0), SectorState::ClearedBehind);
    }

    #[test]
    fn test_three_way_classification() {
        let occ = occupancy(175, 50, 8);
        let sectors = occ.sectors();
        assert_eq!(
            sectors,
            vec![
                SectorState::ClearedBehind,
                SectorState::ClearedBehind,
                SectorState::ClearedBehind,
                SectorState::Active,
                SectorState::Untouched,
                SectorState::Untouched,
                SectorState::Untouched,
                SectorState::Untouched,
            ]
        );
    }

    #[test]
    fn test_zero_capacity_treated_as_one() {
        let occ = occupancy(3, 0, 32);
        assert_eq!(occ.sector_capacity, 1);
        assert_eq!(occ.occupied_count, 3);
        assert_eq!(occ.items_in_active_sector, 1);
    }

    #[test]
    fn test_zero_sectors() {
        let occ = occupancy(40, 50, 0);
        assert_eq!(occ.occupied_count, 0);
        assert_eq!(occ.active_sector_index, -1);
        assert!(occ.sectors().is_empty());
    }

    #[test]
    fn test_default_grid() {
        let occ = default_occupancy(51);
        assert_eq!(occ.total_sectors, 32);
        assert_eq!(occ.sector_capacity, 50);
        assert_eq!(occ.active_sector_index, 1);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(default_occupancy(0)).unwrap();
        assert_eq!(json["activeSectorIndex"], -1);
        assert!(json.get("activeSectorFillPercent").is_some());
        assert_eq!(
            serde_json::to_value(SectorState::ClearedBehind).unwrap(),
            serde_json::json!("cleared-behind")
        );
    }
}
