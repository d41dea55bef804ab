//! Root continuation across the parameter sweep.
//!
//! Every symbolic root branch x = g_k(r) is evaluated at every grid value.
//! Grid values where the representative branch (k = 0) is genuinely undefined
//! are repaired by re-solving f(x, r) = 0 symbolically at that single r:
//!
//! 1. Pass one evaluates all branches and collects the repair set.
//! 2. Pass two sends the whole repair set to the provider in one batch and
//!    reconciles each answer against the branch count N:
//!    * N solutions fill the branches in order;
//!    * any other non-zero count fills every branch with the first solution
//!      (branch identity is lost at coincident roots, so this is an
//!      approximation, not a matching);
//!    * no solutions leaves every branch undefined at that index.
//! 3. Magnitudes below [`ZERO_EPSILON`](crate::evaluator::ZERO_EPSILON) snap
//!    to zero across all entries.

use crate::evaluator::{snap_to_zero, Bindings, CompiledExpression, NonReal};
use crate::grid::SweepGrid;
use crate::provider::SymbolicProvider;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// One branch evaluated over the sweep. `None` marks "not real at this r"
/// (complex, undefined or infinite).
pub type RootTrack = Vec<Option<f64>>;

/// Output of a continuation run: N tracks of M entries each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootContinuation {
    pub tracks: Vec<RootTrack>,
    /// Grid indices that went through symbolic re-solving.
    pub repaired: Vec<usize>,
}

pub fn continue_roots<P: SymbolicProvider + ?Sized>(
    source: &str,
    branches: &[CompiledExpression],
    grid: &SweepGrid,
    provider: &P,
) -> RootContinuation {
    let raw: Vec<Vec<Result<f64, NonReal>>> = branches
        .iter()
        .map(|branch| evaluate_branch(branch, grid))
        .collect();

    let repaired = repair_set(raw.first().map(Vec::as_slice).unwrap_or(&[]));

    let mut tracks: Vec<RootTrack> = raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|value| value.ok().filter(|v| v.is_finite()))
                .collect()
        })
        .collect();

    if !repaired.is_empty() {
        let r_values: Vec<f64> = repaired.iter().map(|&i| grid.values()[i]).collect();
        let solutions = provider
            .resolve_batch(source, &r_values)
            .unwrap_or_else(|err| {
                warn!(count = r_values.len(), error = %err, "Batched re-solve failed");
                Vec::new()
            });

        for (slot, &index) in repaired.iter().enumerate() {
            let sol = solutions.get(slot).map(Vec::as_slice).unwrap_or(&[]);
            if sol.is_empty() {
                warn!(r = r_values[slot], index, "No real solution after re-solve");
            } else {
                trace!(r = r_values[slot], index, solutions = sol.len(), "Repaired roots");
            }
            reconcile(&mut tracks, index, sol);
        }
    }

    for track in &mut tracks {
        for entry in track.iter_mut() {
            *entry = entry.map(snap_to_zero);
        }
    }

    RootContinuation { tracks, repaired }
}

/// Evaluates a branch at every grid value. A branch with no r dependence is
/// evaluated once and broadcast across the grid.
fn evaluate_branch(branch: &CompiledExpression, grid: &SweepGrid) -> Vec<Result<f64, NonReal>> {
    if !branch.depends_on("r") {
        let value = branch.evaluate(&Bindings::default());
        return vec![value; grid.len()];
    }
    let mut stack = Vec::with_capacity(32);
    grid.values()
        .iter()
        .map(|&r| branch.evaluate_with(&Bindings::at_r(r), &mut stack))
        .collect()
}

/// Indices where the representative branch has no real part at all.
/// Complex values are not repaired: the branch is simply not real there.
fn repair_set(representative: &[Result<f64, NonReal>]) -> Vec<usize> {
    representative
        .iter()
        .enumerate()
        .filter(|(_, value)| matches!(value, Err(NonReal::Undefined)))
        .map(|(i, _)| i)
        .collect()
}

/// Fills every branch's slot at `index` from a fresh solution list.
fn reconcile(tracks: &mut [RootTrack], index: usize, solutions: &[f64]) {
    let branch_count = tracks.len();
    for (k, track) in tracks.iter_mut().enumerate() {
        let value = if solutions.len() == branch_count {
            solutions.get(k)
        } else {
            solutions.first()
        };
        if let Some(slot) = track.get_mut(index) {
            *slot = value.copied().filter(|v| v.is_finite());
        }
    }
}
