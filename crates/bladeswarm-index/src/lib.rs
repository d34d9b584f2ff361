//! Spatial neighborhood queries for swarm steering.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
///
/// Contract shared by all implementations: `agent_idx` itself is never
/// visited, even when another point shares its exact coordinates, and a
/// neighbor is reported when its squared distance is at most `radius_sq`.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from agent positions.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` within the provided squared radius.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

/// Exhaustive pairwise scan.
///
/// At tens of agents the O(N^2) sweep beats bucketed structures on constant
/// factors and keeps queries allocation-free, so it is the default index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairwiseIndex {
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
}

impl PairwiseIndex {
    /// Create an empty pairwise index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NeighborhoodIndex for PairwiseIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&(x, y)) = self.positions.get(agent_idx) else {
            return;
        };
        for (other_idx, &(ox, oy)) in self.positions.iter().enumerate() {
            if other_idx == agent_idx {
                continue;
            }
            let dx = ox - x;
            let dy = oy - y;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= radius_sq {
                visitor(other_idx, OrderedFloat(dist_sq));
            }
        }
    }
}

/// Uniform grid index bucketing agents by cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing agents.
    pub cell_size: f32,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
    #[serde(skip)]
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl UniformGridIndex {
    /// Create a new uniform grid with the provided cell size.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            positions: Vec::new(),
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.cells.clear();
        for (idx, &(x, y)) in self.positions.iter().enumerate() {
            let key = self.cell_of(x, y);
            self.cells.entry(key).or_default().push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&(x, y)) = self.positions.get(agent_idx) else {
            return;
        };
        let radius = radius_sq.max(0.0).sqrt();
        let (min_cx, min_cy) = self.cell_of(x - radius, y - radius);
        let (max_cx, max_cy) = self.cell_of(x + radius, y + radius);
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for &other_idx in bucket {
                    if other_idx == agent_idx {
                        continue;
                    }
                    let (ox, oy) = self.positions[other_idx];
                    let dx = ox - x;
                    let dy = oy - y;
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq <= radius_sq {
                        visitor(other_idx, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn collect(index: &dyn NeighborhoodIndex, agent_idx: usize, radius_sq: f32) -> Vec<usize> {
        let mut hits = Vec::new();
        index.neighbors_within(agent_idx, radius_sq, &mut |other_idx, _dist_sq| {
            hits.push(other_idx);
        });
        hits.sort_unstable();
        hits
    }

    #[test]
    fn pairwise_never_visits_self_even_when_coincident() {
        let mut index = PairwiseIndex::new();
        index
            .rebuild(&[(0.0, 0.0), (0.0, 0.0), (3.0, 0.0)])
            .unwrap();
        assert_eq!(collect(&index, 0, 16.0), vec![1, 2]);
        assert_eq!(collect(&index, 1, 16.0), vec![0, 2]);
    }

    #[test]
    fn grid_never_visits_self_even_when_coincident() {
        let mut index = UniformGridIndex::new(10.0);
        index
            .rebuild(&[(5.0, 5.0), (5.0, 5.0), (7.0, 5.0)])
            .unwrap();
        assert_eq!(collect(&index, 0, 25.0), vec![1, 2]);
        assert_eq!(collect(&index, 1, 25.0), vec![0, 2]);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let mut index = PairwiseIndex::new();
        index.rebuild(&[(0.0, 0.0), (3.0, 4.0)]).unwrap();
        assert_eq!(collect(&index, 0, 25.0), vec![1]);
        assert!(collect(&index, 0, 24.99).is_empty());
    }

    #[test]
    fn distances_are_squared() {
        let mut index = PairwiseIndex::new();
        index.rebuild(&[(0.0, 0.0), (3.0, 4.0)]).unwrap();
        let mut reported = Vec::new();
        index.neighbors_within(0, 100.0, &mut |other_idx, dist_sq| {
            reported.push((other_idx, dist_sq.into_inner()));
        });
        assert_eq!(reported, vec![(1, 25.0)]);
    }

    #[test]
    fn grid_matches_pairwise_on_random_cloud() {
        let mut rng = SmallRng::seed_from_u64(0x51de);
        let positions: Vec<(f32, f32)> = (0..120)
            .map(|_| (rng.random_range(0.0..400.0), rng.random_range(0.0..400.0)))
            .collect();

        let mut pairwise = PairwiseIndex::new();
        pairwise.rebuild(&positions).unwrap();
        let mut grid = UniformGridIndex::new(25.0);
        grid.rebuild(&positions).unwrap();

        for radius in [10.0f32, 35.0, 90.0] {
            let radius_sq = radius * radius;
            for idx in 0..positions.len() {
                assert_eq!(
                    collect(&grid, idx, radius_sq),
                    collect(&pairwise, idx, radius_sq),
                    "radius {radius} agent {idx}"
                );
            }
        }
    }

    #[test]
    fn rebuild_replaces_previous_positions() {
        let mut index = UniformGridIndex::new(10.0);
        index
            .rebuild(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])
            .unwrap();
        assert_eq!(collect(&index, 0, 9.0), vec![1, 2]);

        index.rebuild(&[(100.0, 100.0)]).unwrap();
        assert!(collect(&index, 0, 9.0).is_empty());
        assert!(collect(&index, 2, 9.0).is_empty());
    }

    #[test]
    fn grid_rejects_bad_cell_size() {
        for cell_size in [0.0f32, -4.0, f32::NAN] {
            let mut index = UniformGridIndex::new(cell_size);
            assert!(matches!(
                index.rebuild(&[(0.0, 0.0)]),
                Err(IndexError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn out_of_range_agent_idx_is_ignored() {
        let mut pairwise = PairwiseIndex::new();
        pairwise.rebuild(&[(0.0, 0.0)]).unwrap();
        assert!(collect(&pairwise, 5, 100.0).is_empty());

        let mut grid = UniformGridIndex::new(10.0);
        grid.rebuild(&[(0.0, 0.0)]).unwrap();
        assert!(collect(&grid, 5, 100.0).is_empty());
    }
}
