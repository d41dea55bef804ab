//! Provider-free access to the flow: phase portrait and trajectories for an
//! expression without computing a diagram.

use crate::to_js_error;
use pitchfork_core::config::{IntegrationSettings, ParameterRange};
use pitchfork_core::equation_engine::FlowSystem;
use pitchfork_core::field::velocity_field;
use pitchfork_core::grid::phase_grid;
use pitchfork_core::trajectory::integrate;
use pitchfork_core::{Bindings, CompiledExpression};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmFlow {
    flow: CompiledExpression,
}

#[wasm_bindgen]
impl WasmFlow {
    #[wasm_bindgen(constructor)]
    pub fn new(expression: &str) -> Result<WasmFlow, JsValue> {
        console_error_panic_hook::set_once();
        let flow = CompiledExpression::compile(expression).map_err(to_js_error)?;
        Ok(WasmFlow { flow })
    }

    /// f(x, r), or NaN where the flow is not real.
    pub fn velocity(&self, x: f64, r: f64) -> f64 {
        self.flow
            .evaluate(&Bindings::at(x, r))
            .unwrap_or(f64::NAN)
    }

    /// Velocities on the half-open grid [x_min, x_max) with the given step,
    /// NaN where undefined.
    pub fn velocity_field(
        &self,
        x_min: f64,
        x_max: f64,
        step: f64,
        r: f64,
    ) -> Result<Vec<f64>, JsValue> {
        let range = ParameterRange::new(x_min, x_max, step, x_min);
        let grid = phase_grid(&range).map_err(to_js_error)?;
        Ok(velocity_field(&self.flow, &grid, r)
            .samples
            .iter()
            .map(|sample| sample.velocity.unwrap_or(f64::NAN))
            .collect())
    }

    /// RK4 samples from t = 0, interleaved as [t0, x0, t1, x1, ...].
    pub fn trajectory(
        &self,
        x0: f64,
        r: f64,
        time_span: f64,
        step_size: f64,
    ) -> Result<Vec<f64>, JsValue> {
        let settings = IntegrationSettings {
            time_span,
            step_size,
        };
        settings.validate().map_err(to_js_error)?;

        let system = FlowSystem::new(self.flow.bytecode().clone(), r);
        let trajectory = integrate(&system, x0, &settings);
        Ok(trajectory
            .samples()
            .flat_map(|(t, x)| [t, x])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_field_covers_half_open_grid() {
        let flow = WasmFlow::new("r*x - x^3").expect("flow");
        let field = flow.velocity_field(-1.0, 1.0, 0.5, 1.0).expect("valid grid");
        assert_eq!(field, vec![0.0, -0.375, 0.0, 0.375]);
    }

    #[test]
    fn velocity_is_nan_where_not_real() {
        let flow = WasmFlow::new("sqrt(x)").expect("flow");
        assert!(flow.velocity(-4.0, 0.0).is_nan());
        assert_eq!(flow.velocity(4.0, 0.0), 2.0);
    }

    #[test]
    fn trajectory_interleaves_time_and_state() {
        let flow = WasmFlow::new("1").expect("flow");
        let samples = flow.trajectory(0.0, 0.0, 1.0, 0.5).expect("valid settings");
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0], 0.0);
        assert!((samples[4] - 1.0).abs() < 1e-12);
        assert!((samples[5] - 1.0).abs() < 1e-12);
    }
}
