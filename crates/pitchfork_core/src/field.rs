use crate::evaluator::{Bindings, CompiledExpression};
use serde::{Deserialize, Serialize};

/// f(x, r) at one point of the phase grid; `None` where f is not real.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    pub x: f64,
    pub velocity: Option<f64>,
}

/// The instantaneous vector field over the phase grid for one r.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityField {
    pub r: f64,
    pub samples: Vec<FieldSample>,
}

/// Evaluates f(x, r) at t = 0 over `x_grid`.
pub fn velocity_field(flow: &CompiledExpression, x_grid: &[f64], r: f64) -> VelocityField {
    let mut stack = Vec::with_capacity(32);
    let samples = x_grid
        .iter()
        .map(|&x| FieldSample {
            x,
            velocity: flow.evaluate_with(&Bindings::at(x, r), &mut stack).ok(),
        })
        .collect();
    VelocityField { r, samples }
}
