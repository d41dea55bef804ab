use crate::config::{ceil_count, check_sample_count, ParameterRange};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// The discretized r values over which continuation is precomputed.
/// r_i = min + i·step for i in 0..M, M = ⌈(max − min)/step⌉ + 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    min: f64,
    max: f64,
    step: f64,
    values: Vec<f64>,
}

impl SweepGrid {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            bail!("Sweep range must be finite with max > min.");
        }
        if !step.is_finite() || step <= 0.0 {
            bail!("Sweep step must be positive.");
        }
        check_sample_count("Sweep", max - min, step)?;
        let intervals = ceil_count((max - min) / step);
        let values = (0..=intervals).map(|i| min + step * i as f64).collect();
        Ok(Self {
            min,
            max,
            step,
            values,
        })
    }

    pub fn from_range(range: &ParameterRange) -> Result<Self> {
        Self::new(range.min, range.max, range.step)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; a validated grid holds at least two values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Maps a continuous r onto a grid index by linear interpolation of
    /// [min, max] onto [0, M − 1], rounding half up. Out-of-range values
    /// clamp to the nearest end; NaN maps to 0.
    ///
    /// The result is the nearest grid value when (max − min)/step is whole.
    /// Otherwise the last grid value overshoots max, the scale stretches, and
    /// r near max can map one slot beyond its nearest value: on [0, 1] with
    /// step 0.3 the grid is 0, 0.3, 0.6, 0.9, 1.2 and r = 0.9 maps to 1.2.
    pub fn index_of(&self, r: f64) -> usize {
        let last = self.values.len().saturating_sub(1);
        if r.is_nan() {
            return 0;
        }
        let scaled = (r - self.min) / (self.max - self.min) * last as f64;
        let index = (scaled + 0.5).floor();
        if index <= 0.0 {
            0
        } else if index >= last as f64 {
            last
        } else {
            index as usize
        }
    }
}

/// The fixed x-grid for the phase velocity field: min, min + step, ...
/// strictly below max. Independent of the current x₀.
pub fn phase_grid(range: &ParameterRange) -> Result<Vec<f64>> {
    if !range.step.is_finite() || range.step <= 0.0 {
        bail!("Phase grid step must be positive.");
    }
    check_sample_count("Phase grid", range.max - range.min, range.step)?;
    let count = ceil_count((range.max - range.min) / range.step);
    Ok((0..count).map(|i| range.min + range.step * i as f64).collect())
}

#[cfg(test)]
mod tests {
    use super::{phase_grid, SweepGrid};
    use crate::config::ParameterRange;

    #[test]
    fn grid_size_follows_ceiling_rule() {
        let grid = SweepGrid::new(-5.0, 5.0, 0.1).expect("valid grid");
        assert_eq!(grid.len(), 101);
        assert_eq!(grid.values()[0], -5.0);
        assert!((grid.values()[100] - 5.0).abs() < 1e-12);

        let grid = SweepGrid::new(0.0, 1.0, 0.3).expect("valid grid");
        assert_eq!(grid.len(), 5);
    }

    #[test]
    fn grid_is_strictly_increasing_and_uniform() {
        let grid = SweepGrid::new(-2.0, 3.0, 0.25).expect("valid grid");
        for pair in grid.values().windows(2) {
            assert!(pair[1] > pair[0]);
            assert!((pair[1] - pair[0] - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn index_of_picks_nearest_grid_value() {
        let grid = SweepGrid::new(-5.0, 5.0, 0.1).expect("valid grid");
        let mut r = -5.0;
        while r <= 5.0 {
            let index = grid.index_of(r);
            let best = grid
                .values()
                .iter()
                .map(|v| (v - r).abs())
                .fold(f64::INFINITY, f64::min);
            assert!(((grid.values()[index] - r).abs() - best).abs() < 1e-9);
            r += 0.037;
        }
    }

    #[test]
    fn index_of_rounds_half_up() {
        let grid = SweepGrid::new(0.0, 4.0, 1.0).expect("valid grid");
        assert_eq!(grid.index_of(1.5), 2);
        assert_eq!(grid.index_of(2.49), 2);
        assert_eq!(grid.index_of(2.5), 3);
    }

    #[test]
    fn index_of_clamps_at_and_beyond_bounds() {
        let grid = SweepGrid::new(-5.0, 5.0, 0.1).expect("valid grid");
        assert_eq!(grid.index_of(5.0), grid.len() - 1);
        assert_eq!(grid.index_of(-5.0), 0);
        assert_eq!(grid.index_of(12.0), grid.len() - 1);
        assert_eq!(grid.index_of(-12.0), 0);
        assert_eq!(grid.index_of(f64::INFINITY), grid.len() - 1);
        assert_eq!(grid.index_of(f64::NAN), 0);
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(SweepGrid::new(1.0, 1.0, 0.1).is_err());
        assert!(SweepGrid::new(0.0, 1.0, 0.0).is_err());
        assert!(SweepGrid::new(f64::NAN, 1.0, 0.1).is_err());
    }

    #[test]
    fn rejects_grids_too_fine_to_allocate() {
        assert!(SweepGrid::new(-5.0, 5.0, 1e-12).is_err());
        assert!(phase_grid(&ParameterRange::new(-5.0, 5.0, 1e-12, 0.0)).is_err());
        assert!(phase_grid(&ParameterRange::new(-5.0, 5.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn partial_last_step_stretches_the_index_scale() {
        let grid = SweepGrid::new(0.0, 1.0, 0.3).expect("valid grid");
        assert!((grid.values()[4] - 1.2).abs() < 1e-12);
        assert_eq!(grid.index_of(0.9), 4);
        assert_eq!(grid.index_of(1.0), 4);
        assert_eq!(grid.index_of(0.3), 1);
    }

    #[test]
    fn phase_grid_is_half_open() {
        let grid = phase_grid(&ParameterRange::new(-5.0, 5.0, 0.1, 0.5)).expect("valid range");
        assert_eq!(grid.len(), 100);
        assert_eq!(grid[0], -5.0);
        assert!((grid[99] - 4.9).abs() < 1e-12);
    }
}
