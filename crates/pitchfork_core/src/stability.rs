use crate::continuation::RootTrack;
use crate::evaluator::{snap_to_zero, Bindings, NonReal};
use crate::grid::SweepGrid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stability of an equilibrium, from the sign of ∂f/∂x at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Stable,
    Unstable,
    /// Zero derivative (a bifurcation point), non-real derivative, or no root.
    Undefined,
}

impl Stability {
    /// Classifies a derivative value after snapping rounding noise to zero.
    /// Exactly zero is neither side.
    pub fn from_derivative(value: f64) -> Self {
        let value = snap_to_zero(value);
        if value < 0.0 {
            Stability::Stable
        } else if value > 0.0 {
            Stability::Unstable
        } else {
            Stability::Undefined
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Stable => "stable",
            Stability::Unstable => "unstable",
            Stability::Undefined => "undefined",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parallel to a `RootTrack`.
pub type StabilityTrack = Vec<Stability>;

/// Classifies every defined root on every track. `derivative` evaluates
/// ∂f/∂x at the given bindings; entries for undefined roots are never
/// evaluated and stay `Undefined`.
pub fn classify_tracks<D>(tracks: &[RootTrack], grid: &SweepGrid, derivative: D) -> Vec<StabilityTrack>
where
    D: Fn(&Bindings) -> Result<f64, NonReal>,
{
    tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .zip(grid.values())
                .map(|(root, &r)| match root {
                    Some(x) => derivative(&Bindings::at(*x, r))
                        .map(Stability::from_derivative)
                        .unwrap_or(Stability::Undefined),
                    None => Stability::Undefined,
                })
                .collect()
        })
        .collect()
}
