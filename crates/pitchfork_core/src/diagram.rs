//! Precomputed equilibria and stability over the whole sweep.
//!
//! Computed once per expression, then read by grid index on every parameter
//! change.

use crate::continuation::{continue_roots, RootTrack};
use crate::grid::SweepGrid;
use crate::model::EquationModel;
use crate::provider::SymbolicProvider;
use crate::stability::{classify_tracks, Stability, StabilityTrack};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A defined equilibrium at one grid index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium {
    pub branch: usize,
    pub value: f64,
    pub stability: Stability,
}

/// RootTracks and StabilityTracks, N rows by M columns each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BifurcationDiagram {
    pub r_values: Vec<f64>,
    pub roots: Vec<RootTrack>,
    pub stability: Vec<StabilityTrack>,
    /// Grid indices that needed symbolic re-solving.
    pub repaired: Vec<usize>,
}

impl BifurcationDiagram {
    /// Runs root continuation followed by stability classification.
    pub fn compute<P: SymbolicProvider + ?Sized>(
        model: &EquationModel,
        grid: &SweepGrid,
        provider: &P,
    ) -> Self {
        let continuation = continue_roots(model.source(), model.roots(), grid, provider);
        let stability = classify_tracks(&continuation.tracks, grid, |bindings| {
            model.derivative_at(bindings)
        });
        debug!(
            expression = model.source(),
            branches = continuation.tracks.len(),
            grid_size = grid.len(),
            repaired = continuation.repaired.len(),
            "Computed bifurcation diagram"
        );
        Self {
            r_values: grid.values().to_vec(),
            roots: continuation.tracks,
            stability,
            repaired: continuation.repaired,
        }
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// Number of grid columns M.
    pub fn len(&self) -> usize {
        self.r_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r_values.is_empty()
    }

    /// One value per branch at a grid index; `None` where undefined.
    pub fn roots_at(&self, index: usize) -> Vec<Option<f64>> {
        self.roots
            .iter()
            .map(|track| track.get(index).copied().flatten())
            .collect()
    }

    /// One label per branch at a grid index.
    pub fn stability_at(&self, index: usize) -> Vec<Stability> {
        self.stability
            .iter()
            .map(|track| track.get(index).copied().unwrap_or(Stability::Undefined))
            .collect()
    }

    /// The defined equilibria at a grid index.
    pub fn equilibria_at(&self, index: usize) -> Vec<Equilibrium> {
        self.roots_at(index)
            .into_iter()
            .zip(self.stability_at(index))
            .enumerate()
            .filter_map(|(branch, (root, stability))| {
                root.map(|value| Equilibrium {
                    branch,
                    value,
                    stability,
                })
            })
            .collect()
    }

    /// Branch `k` restricted to points carrying `label`, `None` elsewhere.
    /// Empty when the branch does not exist.
    pub fn locus(&self, k: usize, label: Stability) -> Vec<Option<f64>> {
        match (self.roots.get(k), self.stability.get(k)) {
            (Some(roots), Some(labels)) => roots
                .iter()
                .zip(labels)
                .map(|(root, &stability)| root.filter(|_| stability == label))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn stable_locus(&self, k: usize) -> Vec<Option<f64>> {
        self.locus(k, Stability::Stable)
    }

    pub fn unstable_locus(&self, k: usize) -> Vec<Option<f64>> {
        self.locus(k, Stability::Unstable)
    }
}
