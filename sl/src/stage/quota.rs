//! Per-color sort quota

use std::collections::HashMap;

use crate::color::CubeColor;

/// Counts sorted cubes per color against a fixed cap
#[derive(Debug, Clone)]
pub struct ColorQuota {
    cap: u32,
    counts: HashMap<CubeColor, u32>,
}

impl ColorQuota {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            counts: HashMap::new(),
        }
    }

    pub fn count(&self, color: CubeColor) -> u32 {
        self.counts.get(&color).copied().unwrap_or(0)
    }

    /// Count one cube if its color is sortable and under the cap
    pub fn try_claim(&mut self, color: CubeColor) -> bool {
        if color == CubeColor::Unknown || self.count(color) >= self.cap {
            return false;
        }
        *self.counts.entry(color).or_insert(0) += 1;
        true
    }

    /// True once every sortable color reached the cap
    pub fn is_complete(&self) -> bool {
        CubeColor::SORTED.iter().all(|c| self.count(*c) >= self.cap)
    }

    /// Counts in a fixed color order
    pub fn counts(&self) -> Vec<(CubeColor, u32)> {
        CubeColor::SORTED.iter().map(|c| (*c, self.count(*c))).collect()
    }
}
